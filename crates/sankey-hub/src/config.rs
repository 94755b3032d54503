use anyhow::Result;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub input: PathBuf,
    pub socket: Option<String>,
}

pub fn parse_args() -> Result<HubConfig> {
    parse_args_from(std::env::args_os().skip(1))
}

fn parse_args_from<I>(args: I) -> Result<HubConfig>
where
    I: IntoIterator<Item = OsString>,
{
    let mut input = None;
    let mut socket = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--input" {
            let Some(path) = args.next() else {
                anyhow::bail!("--input expects a path");
            };
            input = Some(PathBuf::from(path));
        } else if arg == "--socket" {
            let Some(path) = args.next() else {
                anyhow::bail!("--socket expects a path");
            };
            socket = Some(path.to_string_lossy().into_owned());
        } else {
            anyhow::bail!("unknown argument: {:?}", arg);
        }
    }

    let Some(input) = input else {
        anyhow::bail!("missing --input <file>");
    };

    Ok(HubConfig { input, socket })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn parses_input_and_socket() {
        let config = parse_args_from(args(&["--input", "flows.json", "--socket", "/tmp/s.sock"]))
            .expect("config parsed");
        assert_eq!(config.input, PathBuf::from("flows.json"));
        assert_eq!(config.socket.as_deref(), Some("/tmp/s.sock"));
    }

    #[test]
    fn socket_is_optional() {
        let config = parse_args_from(args(&["--input", "flows.json"])).expect("config parsed");
        assert_eq!(config.socket, None);
    }

    #[test]
    fn input_is_required() {
        assert!(parse_args_from(args(&[])).is_err());
        assert!(parse_args_from(args(&["--input"])).is_err());
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(parse_args_from(args(&["--input", "a.json", "--mode", "user"])).is_err());
    }
}
