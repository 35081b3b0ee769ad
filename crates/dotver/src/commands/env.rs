use super::{CliError, Context};

/// Print `eval`-able exports for the managed installation.
pub fn run(ctx: &Context) -> Result<(), CliError> {
    let instances = ctx.root.instances_dir();
    println!("export DOTNET_ROOT=\"{}\"", instances.display());
    println!("export PATH=\"{}:$PATH\"", instances.display());
    Ok(())
}
