//! `rvmctl`: a scripted driver over the RVM library.
//!
//! Not part of the engine's public contract — a development convenience for exercising
//! `map`/`begin_trans`/`about_to_modify`/`commit_trans`/`abort_trans`/`truncate_log` end to end
//! from the command line or a tiny script file. The script mini-language:
//!
//! ```text
//! map <name> <size>                          # map/create a segment
//! unmap <name>
//! destroy <name>
//! show <name>                                # print a segment's bytes as hex
//! truncate                                   # truncate_log
//! txn <commit|abort> <name>:<offset>:<hex> …  # one transaction, one or more modifications
//! ```

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use clap::Parser;

use rvm::config::Config;
use rvm::segment::SegmentHandle;
use rvm::Rvm;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::parse();
    let mut rvm = Rvm::init(&config.dir).context("failed to initialize rvm instance")?;
    let mut handles: HashMap<String, SegmentHandle> = HashMap::new();

    let lines = config.script_lines().context("failed to read script")?;
    for line in lines {
        run_line(&mut rvm, &mut handles, &line)
            .with_context(|| format!("while running script line: {line}"))?;
    }

    Ok(())
}

fn run_line(rvm: &mut Rvm, handles: &mut HashMap<String, SegmentHandle>, line: &str) -> Result<()> {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("map") => {
            let name = tokens.next().context("map requires a segment name")?;
            let size: i64 = tokens
                .next()
                .context("map requires a size")?
                .parse()
                .context("map size must be an integer")?;
            let handle = rvm
                .map(name, size)
                .with_context(|| format!("map {name} failed"))?;
            println!("mapped {name} ({} bytes)", rvm.segment_len(handle).unwrap_or(0));
            handles.insert(name.to_string(), handle);
        }
        Some("unmap") => {
            let name = tokens.next().context("unmap requires a segment name")?;
            if let Some(handle) = handles.remove(name) {
                rvm.unmap(handle);
                println!("unmapped {name}");
            }
        }
        Some("destroy") => {
            let name = tokens.next().context("destroy requires a segment name")?;
            rvm.destroy(name);
            println!("destroyed {name}");
        }
        Some("truncate") => {
            rvm.truncate_log().context("truncate_log failed")?;
            println!("truncated logs");
        }
        Some("show") => {
            let name = tokens.next().context("show requires a segment name")?;
            let handle = *handles.get(name).context("show: segment is not mapped")?;
            let bytes = rvm
                .segment(handle)
                .context("show: segment handle is stale")?;
            println!("{name}: {}", to_hex(bytes));
        }
        Some("txn") => {
            let mode = tokens.next().context("txn requires commit or abort")?;
            let mods: Vec<&str> = tokens.collect();
            run_txn(rvm, handles, mode, &mods)?;
        }
        Some(other) => bail!("unknown operation: {other}"),
        None => {}
    }
    Ok(())
}

fn run_txn(
    rvm: &mut Rvm,
    handles: &HashMap<String, SegmentHandle>,
    mode: &str,
    mods: &[&str],
) -> Result<()> {
    let mut parsed = Vec::new();
    for m in mods {
        let mut parts = m.splitn(3, ':');
        let name = parts
            .next()
            .context("txn modification missing segment name")?;
        let offset: u64 = parts
            .next()
            .context("txn modification missing offset")?
            .parse()
            .context("txn modification offset must be an integer")?;
        let hex = parts.next().context("txn modification missing payload")?;
        let payload = parse_hex(hex)?;
        let handle = *handles
            .get(name)
            .with_context(|| format!("txn: segment {name} is not mapped"))?;
        parsed.push((handle, offset, payload));
    }

    let mut segs: Vec<SegmentHandle> = Vec::new();
    for (handle, _, _) in &parsed {
        if !segs.contains(handle) {
            segs.push(*handle);
        }
    }

    let mut trans = rvm.begin_trans(&segs).context("begin_trans failed")?;
    for (handle, offset, payload) in &parsed {
        rvm.about_to_modify(&mut trans, *handle, *offset, payload.len() as u64);
        if let Some(buf) = rvm.segment_mut(*handle) {
            let start = *offset as usize;
            buf[start..start + payload.len()].copy_from_slice(payload);
        }
    }

    match mode {
        "commit" => {
            rvm.commit_trans(trans);
            println!("transaction committed ({} segment(s))", segs.len());
        }
        "abort" => {
            rvm.abort_trans(trans);
            println!("transaction aborted ({} segment(s))", segs.len());
        }
        other => bail!("txn mode must be commit or abort, got {other}"),
    }

    Ok(())
}

fn parse_hex(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        bail!("hex payload must have an even number of digits: {s}");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).with_context(|| format!("invalid hex byte in {s}")))
        .collect()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}
