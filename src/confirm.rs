use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::format::human_size;

/// Ask the operator to confirm the destructive run. Only the exact answer
/// `YES` counts as consent.
pub fn confirm_destruction<R: BufRead, W: Write, E: Write>(
    input: &mut R,
    prompt_out: &mut W,
    warn_out: &mut E,
    device: &Path,
    disksize: u64,
) -> io::Result<bool> {
    writeln!(
        warn_out,
        "Content of disk {} ({}) WILL BE DESTROYED",
        device.display(),
        human_size(disksize)
    )?;
    write!(prompt_out, "Are you sure (type 'YES' to confirm)? ")?;
    prompt_out.flush()?;

    let mut response = String::new();
    input.read_line(&mut response)?;
    Ok(response.trim_end_matches(['\r', '\n']) == "YES")
}
