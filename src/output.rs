use std::io::{self, Write};

use serde::Serialize;

use crate::app::RefreshResult;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_refresh(result: &RefreshResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub fn summary_line(result: &RefreshResult) -> String {
    let action = if result.replaced { "updated" } else { "added" };
    format!(
        "{action} {} in {} ({} things; {} thumbnails staged, {} rendered)",
        result.thing_id, result.tracker_path, result.things_count, result.relocated, result.rendered
    )
}
