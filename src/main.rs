//! src/main.rs

use std::io::{self, ErrorKind};
use std::panic;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use blockbreak::confirm::confirm_destruction;
use blockbreak::format::{human_signed, human_size};
use blockbreak::log::{current_timestamp, Logger};
use blockbreak::{plan, BlockDevice, BlockTester, FileDevice, PlanError, Quantity, Range, TestError};

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[clap(author, version, about = "Test block devices at specific disk locations", long_about = None)]
struct Cli {
    #[clap(short, long, value_name = "pos", default_value = "0",
        help = "Origin inside the disk at which to start testing. Plain integers are bytes; suffixes 'M', 'G', 'T', 'Mi', 'Gi', 'Ti', 's', 'p' and '%' select 10^6, 10^9, 10^12, 2^20, 2^30, 2^40 bytes, 512 byte sectors, 4096 byte pages or a percentage of the disk size")]
    origin: Quantity,
    #[clap(short = 'r', long, value_name = "range", default_value = "+100%", allow_hyphen_values = true,
        help = "Range to test relative to the origin. Prefix '+' moves only forward, '-' or '~' only backward, otherwise both directions. Takes the same suffixes as --origin")]
    testrange: Range,
    #[clap(short, long, value_name = "size", default_value_t = 1024 * 1024,
        value_parser = clap::value_parser!(u64).range(1..), help = "Block size in bytes")]
    blocksize: u64,
    #[clap(long, help = "Do not align the window bounds to the block size")]
    no_align: bool,
    #[clap(short, long, help = "Show more detailed output")]
    verbose: bool,
    #[clap(long, help = "Skip the confirmation before overwriting the device")]
    i_know_what_im_doing: bool,
    #[clap(long, value_name = "path", help = "Append all diagnostic lines to this file")]
    log_file: Option<PathBuf>,
    #[clap(long, help = "Show a progress bar")]
    progress: bool,
    #[clap(long, help = "Print a JSON summary to stdout after a successful run")]
    json: bool,
    #[clap(value_name = "blockdev", help = "Device that should be tested")]
    blockdev: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Test(#[from] TestError),
}

enum Outcome {
    Completed,
    Declined,
}

fn setup_signal_handler() -> io::Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C; restoring the current block before stopping...");
        STOP_REQUESTED.store(true, Ordering::SeqCst);
    })
    .map_err(|e| io::Error::new(ErrorKind::Other, e.to_string()))
}

fn main() {
    let cli = Cli::parse();
    let mut log = Logger::new(cli.verbose);
    if let Some(path) = &cli.log_file {
        log = match log.clone().with_log_file(path) {
            Ok(l) => l,
            Err(e) => {
                eprintln!("[{}] Failed to open log file '{}': {}. Further logs will only go to stderr.", current_timestamp(), path.display(), e);
                log
            }
        };
    }

    let main_result = panic::catch_unwind(panic::AssertUnwindSafe(|| main_logic(cli, &mut log)));
    let exit_code = match main_result {
        Ok(Ok(Outcome::Completed)) => 0,
        Ok(Ok(Outcome::Declined)) => 1,
        Ok(Err(e)) => {
            log.info(format!("Test failed: {}", e));
            1
        }
        Err(panic_payload) => {
            let mut panic_msg = String::from("A critical error occurred: Test panicked!");
            if let Some(s) = panic_payload.downcast_ref::<String>() { panic_msg.push_str(&format!("\nPanic message: {}", s)); }
            else if let Some(s) = panic_payload.downcast_ref::<&str>() { panic_msg.push_str(&format!("\nPanic message: {}", s)); }
            log.info(panic_msg);
            101
        }
    };
    std::process::exit(exit_code);
}

fn main_logic(cli: Cli, log: &mut Logger) -> Result<Outcome, AppError> {
    let mut device = FileDevice::open(&cli.blockdev)?;
    let disksize = device.size()?;
    // Fails on an empty device before the operator is asked anything.
    let plan = plan(disksize, &cli.origin, &cli.testrange, cli.blocksize, !cli.no_align)?;
    log.verbose(format!("Disk size: {} bytes ({})", disksize, human_size(disksize)));

    if !cli.i_know_what_im_doing {
        let confirmed = confirm_destruction(
            &mut io::stdin().lock(),
            &mut io::stdout(),
            &mut io::stderr(),
            device.path(),
            disksize,
        )?;
        if !confirmed {
            log.notice("Aborted process, nothing was written.");
            return Ok(Outcome::Declined);
        }
    }

    log.verbose(format!(
        "Origin at {} bytes ({}), testrange {}{} bytes ({}).",
        plan.origin,
        human_signed(plan.origin),
        plan.direction.sign(),
        plan.testrange,
        human_signed(plan.testrange)
    ));
    let window = plan.window;
    log.verbose(format!(
        "Range: {} to {} bytes ({} to {}) - length {} bytes ({})",
        window.min,
        window.max,
        human_size(window.min),
        human_size(window.max),
        window.len(),
        human_size(window.len())
    ));
    log.verbose(format!("Processing {} blocks.", plan.block_count()));

    let progress = if cli.progress {
        let pb = ProgressBar::new(plan.block_count());
        pb.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta_precise}) {wide_msg}")
                .map_err(|e| io::Error::new(ErrorKind::Other, e))?
                .progress_chars("##-"),
        );
        log.attach_progress(pb.clone());
        Some(pb)
    } else {
        None
    };

    // Installed only now so Ctrl+C at the prompt still ends the process.
    setup_signal_handler()?;
    let mut tester = BlockTester::new(device);
    let result = tester.run(&plan, &STOP_REQUESTED, |p| {
        if let Some(pb) = &progress {
            pb.set_position(p.index);
        }
        log.verbose(format!(
            "{:.1}%: Testing offset {} / 0x{:x} ({})",
            p.percent_done(),
            p.block.offset,
            p.block.offset,
            human_size(p.block.offset)
        ));
    });
    drop(tester);

    if let Some(pb) = log.detach_progress() {
        match &result {
            Ok(_) => pb.finish_with_message("Test scan completed."),
            Err(_) => pb.abandon_with_message("Test aborted."),
        }
    }

    let summary = result?;
    if cli.json {
        println!("{}", summary.to_json());
    }
    if log.is_verbose() {
        log.notice("Testing finished successfully, no errors reported.");
    } else {
        log.verbose("Testing finished successfully, no errors reported.");
    }
    Ok(Outcome::Completed)
}
