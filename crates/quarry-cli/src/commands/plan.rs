//! Plan command implementation.

use crate::cli::PlanArgs;
use crate::error::Result;
use crate::output::Formatter;
use quarry_domain::plan;

/// Execute the plan command.
pub fn execute_plan(args: PlanArgs, formatter: &Formatter) -> Result<()> {
    let ranges = plan(args.rows, args.chunk_size)?;
    println!("{}", formatter.format_plan(&ranges)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::error::CliError;

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let args = PlanArgs {
            rows: 10,
            chunk_size: 0,
        };
        assert!(matches!(execute_plan(args, &formatter), Err(CliError::Plan(_))));
    }
}
