use super::Context;
use anyhow::Result;
use std::fs;

pub fn show(ctx: &Context) -> Result<()> {
    print!("{}", toml::to_string_pretty(&ctx.config)?);
    Ok(())
}

pub fn path(ctx: &Context) -> Result<()> {
    println!("config: {}", ctx.config_service.path().display());
    println!("store:  {}", ctx.store_path()?.display());
    println!("logs:   {}", ctx.paths.logs_dir()?.display());
    Ok(())
}

pub fn init(ctx: &Context) -> Result<()> {
    let path = ctx.config_service.path();
    if fs::metadata(path).is_ok() {
        println!("{} already exists, left unchanged", path.display());
        return Ok(());
    }
    ctx.config_service.save(&ctx.config)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
