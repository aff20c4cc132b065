//! Status and list commands - operation status lookups.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use luna_aml::OperationStatus;

use super::{Context, OwnerArgs, print_json};

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Operation name (the entry point it was submitted with)
    pub operation_name: String,

    /// Operation id returned by submit
    pub operation_id: String,

    #[command(flatten)]
    pub owner: OwnerArgs,
}

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Operation name (the entry point it was submitted with)
    pub operation_name: String,

    #[command(flatten)]
    pub owner: OwnerArgs,
}

/// Run the status command.
pub async fn run(args: StatusArgs, ctx: &Context) -> Result<()> {
    let adapter = ctx.connect().await?;
    let status = adapter
        .get_operation_status(
            &args.operation_name,
            &args.operation_id,
            &args.owner.user_id,
            &args.owner.subscription_id,
        )
        .await?;

    if ctx.json_output {
        print_json(&status)?;
    } else {
        print_status(&status);
    }
    Ok(())
}

/// Run the list command.
pub async fn run_list(args: ListArgs, ctx: &Context) -> Result<()> {
    let adapter = ctx.connect().await?;
    let statuses = adapter
        .list_operations(
            &args.operation_name,
            &args.owner.user_id,
            &args.owner.subscription_id,
        )
        .await?;

    if ctx.json_output {
        return print_json(&statuses);
    }

    let dim = Style::new().dim();
    println!("{}", style(format!("Operations: {}", args.operation_name)).bold());
    println!("{}", dim.apply_to("─".repeat(50)));
    for status in &statuses {
        print_status(status);
    }
    if ctx.verbose {
        println!();
        println!("{}", dim.apply_to(format!("{} operation(s)", statuses.len())));
    }
    Ok(())
}

fn print_status(status: &OperationStatus) {
    println!(
        "{}  {}",
        status.operation_id,
        status_style(&status.status).apply_to(&status.status)
    );
}

fn status_style(status: &str) -> Style {
    match status {
        "Completed" | "Finished" => Style::new().green(),
        "Failed" | "Canceled" | "Cancelled" => Style::new().red(),
        "Running" | "Finalizing" => Style::new().cyan(),
        _ => Style::new().yellow(),
    }
}
