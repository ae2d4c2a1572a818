use crate::areas::SOD_DIR;
use crate::areas::repository::Repository;

/// Initialize a sod repository under the current working directory
pub fn init() -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    Repository::init_at(&cwd)?;
    println!(
        "Initialized empty sod repository in {}",
        cwd.join(SOD_DIR).display()
    );
    Ok(())
}
