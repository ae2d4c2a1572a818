use crate::areas::repository::Repository;
use crate::artifacts::aux::{AuxStoreSpec, UrlTemplate};
use crate::errors::SodError;
use std::io::Write;

/// The only auxiliary store type currently implemented
const PLAIN_TYPE: &str = "plain";

impl Repository {
    /// Register an auxiliary data store
    pub async fn aux_add(&mut self, name: &str, url: &str, type_name: &str) -> anyhow::Result<()> {
        if type_name != PLAIN_TYPE {
            return Err(SodError::BadArgument(format!(
                "not a recognized auxiliary data store type: {}",
                type_name
            ))
            .into());
        }
        AuxStoreSpec::check_name(name)?;
        if self.config().aux_store(name)?.is_some() {
            return Err(SodError::BadArgument(format!(
                "auxiliary data store of this name already exists: {}",
                name
            ))
            .into());
        }

        // validation is the whole point; the template string is stored as-is
        UrlTemplate::parse(url)?;

        self.config_mut().add_aux_store(name, PLAIN_TYPE, url);
        self.config().save()?;
        Ok(())
    }

    /// List registered auxiliary data stores
    pub async fn aux_list(&mut self) -> anyhow::Result<()> {
        let specs = self.config().aux_stores()?;
        let mut writer = self.writer();
        for spec in specs {
            writeln!(
                writer,
                "{} {} ({})",
                spec.name,
                spec.url.display(),
                spec.kind().as_str()
            )?;
        }
        Ok(())
    }

    /// Remove an auxiliary data store and its caches
    pub async fn aux_remove(&mut self, name: &str) -> anyhow::Result<()> {
        if self.config().aux_store(name)?.is_none() {
            return Err(SodError::BadArgument(format!(
                "no such auxiliary data store: {}",
                name
            ))
            .into());
        }

        self.aux_registry().remove_store(name);
        self.config_mut().remove_aux_store(name);
        self.config().save()?;
        Ok(())
    }

    /// Refresh the snapshot caches of selected stores
    pub async fn aux_update(&mut self, update_all: bool, names: &[String]) -> anyhow::Result<()> {
        let specs = if update_all {
            self.config().aux_stores()?
        } else if names.is_empty() {
            return Err(SodError::BadArgument("no store selected".to_string()).into());
        } else {
            let mut specs = Vec::new();
            for name in names {
                let spec = self.config().aux_store(name)?.ok_or_else(|| {
                    SodError::BadArgument(format!("no such auxiliary data store: {}", name))
                })?;
                specs.push(spec);
            }
            specs
        };

        for spec in specs {
            self.aux_registry().update_store(&spec)?;
        }
        Ok(())
    }
}
