//! `trackline convert-dates`

use anyhow::Result;
use colored::*;

use crate::cli::ConvertDatesArgs;
use crate::sync::enrich::convert_dates;

pub fn handle_convert_dates_command(args: ConvertDatesArgs) -> Result<()> {
    for value in &args.values {
        let converted = convert_dates(value);
        if converted == *value {
            println!("{}", converted);
        } else {
            println!("{} {} {}", value.dimmed(), "->".dimmed(), converted);
        }
    }
    Ok(())
}
