use crate::areas::config::{Config, PUBLIC_KEYS};
use crate::areas::repository::Repository;
use crate::errors::SodError;
use std::io::Write;

impl Repository {
    /// Show or set configuration options
    ///
    /// No argument lists all options; `NAME` prints one value; `NAME=`
    /// clears it; `NAME=VALUE` assigns it.
    pub async fn config_cmd(&mut self, assignment: Option<&str>) -> anyhow::Result<()> {
        let Some(assignment) = assignment else {
            let mut writer = self.writer();
            for key in PUBLIC_KEYS {
                writeln!(writer, "{}={}", key, self.config().get(key).unwrap_or(""))?;
            }
            return Ok(());
        };

        match assignment.split_once('=') {
            None => {
                Config::check_public_key(assignment)?;
                writeln!(
                    self.writer(),
                    "{}",
                    self.config().get(assignment).unwrap_or("")
                )?;
            }
            Some(("", _)) => {
                return Err(SodError::BadArgument("got empty option name".to_string()).into());
            }
            Some((name, "")) => {
                Config::check_public_key(name)?;
                self.config_mut().unset(name);
                self.config().save()?;
            }
            Some((name, value)) => {
                Config::check_public_key(name)?;
                self.config_mut().set(name, value);
                self.config().save()?;
            }
        }

        Ok(())
    }
}
