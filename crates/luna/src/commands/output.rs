//! Output commands - files produced by operations.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use luna_aml::OperationOutput;

use super::{Context, OwnerArgs, print_json};

/// Arguments for the output command.
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Operation name (the entry point it was submitted with)
    pub operation_name: String,

    /// Operation id returned by submit
    pub operation_id: String,

    #[command(flatten)]
    pub owner: OwnerArgs,
}

/// Arguments for the outputs command.
#[derive(Args, Debug)]
pub struct OutputsArgs {
    /// Operation name (the entry point it was submitted with)
    pub operation_name: String,

    #[command(flatten)]
    pub owner: OwnerArgs,
}

/// Arguments for the delete-output command.
#[derive(Args, Debug)]
pub struct DeleteOutputArgs {
    /// Operation name (the entry point it was submitted with)
    pub operation_name: String,

    /// Operation id returned by submit
    pub operation_id: String,

    /// Product the operation belongs to
    #[arg(long)]
    pub product: String,

    /// Deployment of the product
    #[arg(long)]
    pub deployment: String,

    /// API version of the deployment
    #[arg(long = "api-version")]
    pub api_version: String,

    #[command(flatten)]
    pub owner: OwnerArgs,
}

/// Run the output command.
pub async fn run(args: OutputArgs, ctx: &Context) -> Result<()> {
    let adapter = ctx.connect().await?;
    let output = adapter
        .get_operation_output(
            &args.operation_name,
            &args.operation_id,
            &args.owner.user_id,
            &args.owner.subscription_id,
        )
        .await?;

    if ctx.json_output {
        print_json(&output)?;
    } else {
        print_output(&output);
    }
    Ok(())
}

/// Run the outputs command.
pub async fn run_list(args: OutputsArgs, ctx: &Context) -> Result<()> {
    let adapter = ctx.connect().await?;
    let outputs = adapter
        .list_operation_outputs(
            &args.operation_name,
            &args.owner.user_id,
            &args.owner.subscription_id,
        )
        .await?;

    if ctx.json_output {
        return print_json(&outputs);
    }

    for output in &outputs {
        print_output(output);
        println!();
    }
    Ok(())
}

/// Run the delete-output command.
pub async fn run_delete(args: DeleteOutputArgs, ctx: &Context) -> Result<()> {
    let adapter = ctx.connect().await?;
    adapter
        .delete_operation_output(
            &args.product,
            &args.deployment,
            &args.api_version,
            &args.operation_name,
            &args.operation_id,
            &args.owner.user_id,
            &args.owner.subscription_id,
        )
        .await?;

    if ctx.json_output {
        print_json(&serde_json::json!({
            "operationId": args.operation_id,
            "deleted": false,
        }))?;
    } else {
        let dim = Style::new().dim();
        println!(
            "{}",
            dim.apply_to(format!(
                "Outputs of {} are retained; nothing was deleted",
                args.operation_id
            ))
        );
    }
    Ok(())
}

fn print_output(output: &OperationOutput) {
    let dim = Style::new().dim();
    println!("{}", style(&output.operation_id).bold());
    if output.files.is_empty() {
        println!("  {}", dim.apply_to("(no files)"));
    }
    for file in &output.files {
        println!("  {}", file);
    }
}
