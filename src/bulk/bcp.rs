/// Bulk copies through the `bcp` command-line utility.
use crate::bulk::BulkCopy;
use crate::config::{ServerConfig, DEFAULT_PORT};
use crate::core::{Error, Result};
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Runs `bcp` against the server described by a `ServerConfig`
#[derive(Debug, Clone)]
pub struct BcpTool {
    config: ServerConfig,
}

impl BcpTool {
    pub fn new(config: ServerConfig) -> Self {
        BcpTool { config }
    }

    /// `-S` argument: the host, with `,port` when not on the default port
    fn server(&self) -> String {
        if self.config.port == DEFAULT_PORT {
            self.config.host.clone()
        } else {
            format!("{},{}", self.config.host, self.config.port)
        }
    }

    fn connection_args(&self) -> Vec<OsString> {
        vec![
            "-S".into(),
            self.server().into(),
            "-U".into(),
            self.config.user.clone().into(),
            "-P".into(),
            self.config.password.clone().into(),
            "-d".into(),
            self.config.database.clone().into(),
        ]
    }

    /// Arguments for `bcp <table> format nul ...`
    pub fn format_args(&self, table: &str, format_file: &Path, delimiter: char) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            table.into(),
            "format".into(),
            "nul".into(),
            "-c".into(),
            "-f".into(),
            format_file.into(),
            format!("-t{}", delimiter).into(),
        ];
        args.extend(self.connection_args());
        args
    }

    /// Arguments for `bcp <table> in <data file> ...`
    pub fn load_args(
        &self,
        table: &str,
        data_file: &Path,
        format_file: &Path,
        max_errors: u32,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            table.into(),
            "in".into(),
            data_file.into(),
            "-f".into(),
            format_file.into(),
            "-m".into(),
            max_errors.to_string().into(),
        ];
        args.extend(self.connection_args());
        args
    }

    /// Runs bcp to completion. Output is only logged; a non-zero exit
    /// becomes `Error::Process` carrying the exit code.
    fn run(&self, args: Vec<OsString>) -> Result<()> {
        let program = self.config.bcp_program.display().to_string();
        debug!("Running {} {:?}", program, args.first());

        let child = Command::new(&self.config.bcp_program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let output = child.wait_with_output()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        info!("{} stdout: {}", program, stdout.trim_end());
        info!("{} stderr: {}", program, stderr.trim_end());

        if output.status.success() {
            Ok(())
        } else {
            info!("{} exited with {}", program, output.status);
            Err(Error::Process {
                program,
                code: output.status.code(),
            })
        }
    }
}

impl BulkCopy for BcpTool {
    fn generate_format_file(&self, table: &str, format_file: &Path, delimiter: char) -> Result<()> {
        self.run(self.format_args(table, format_file, delimiter))
    }

    fn load(&self, table: &str, data_file: &Path, format_file: &Path, max_errors: u32) -> Result<()> {
        self.run(self.load_args(table, data_file, format_file, max_errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> BcpTool {
        BcpTool::new(ServerConfig::new("loader", "pw", "db.local", "sales"))
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_format_command_line() {
        let args = strings(tool().format_args("dbo.users", Path::new("/tmp/u.fmt"), '\t'));
        assert_eq!(
            args,
            vec![
                "dbo.users", "format", "nul", "-c", "-f", "/tmp/u.fmt", "-t\t", "-S", "db.local",
                "-U", "loader", "-P", "pw", "-d", "sales",
            ]
        );
    }

    #[test]
    fn test_load_command_line() {
        let args = strings(tool().load_args(
            "dbo.users",
            Path::new("/tmp/u.tsv"),
            Path::new("/tmp/u.fmt"),
            1,
        ));
        assert_eq!(
            args,
            vec![
                "dbo.users", "in", "/tmp/u.tsv", "-f", "/tmp/u.fmt", "-m", "1", "-S", "db.local",
                "-U", "loader", "-P", "pw", "-d", "sales",
            ]
        );
    }

    #[test]
    fn test_non_default_port() {
        let tool = BcpTool::new(ServerConfig::new("u", "p", "db.local", "d").with_port(14330));
        let args = strings(tool.format_args("t", Path::new("f"), '\t'));
        assert!(args.contains(&"db.local,14330".to_string()));
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_output_is_logged_at_info() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        // `echo` prints its arguments, standing in for bcp's progress output
        let mut config = ServerConfig::new("loader", "pw", "db.local", "sales");
        config.bcp_program = "echo".into();
        tracing::subscriber::with_default(subscriber, || {
            BcpTool::new(config)
                .generate_format_file("dbo.users", Path::new("/tmp/u.fmt"), '\t')
                .unwrap();
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("echo stdout: dbo.users format nul"), "{}", logs);
    }

    #[test]
    fn test_missing_program() {
        let mut config = ServerConfig::new("u", "p", "h", "d");
        config.bcp_program = "/nonexistent/bin/bcp".into();
        let err = BcpTool::new(config)
            .generate_format_file("t", Path::new("f"), '\t')
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
