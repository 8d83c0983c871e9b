//! Hash command - content digest of text, bytes or JSON documents

use anyhow::{Context, Result, bail};
use labkit_domain::{ContainerTagging, ContentHasher, DIGEST_LEN, Value};
use serde::Serialize;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::args::HashArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct HashReport {
    hex: String,
    kind: String,
    tagged: bool,
    /// Type names hashed from their debug representation
    fallbacks: Vec<String>,
}

pub async fn execute(args: HashArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let mut options = config.hash.options();
    if let Some(length) = args.length {
        options.hex_length = length;
    }
    if options.hex_length > DIGEST_LEN * 2 {
        bail!(
            "Hex length {} exceeds the {} characters of a digest",
            options.hex_length,
            DIGEST_LEN * 2
        );
    }
    if args.tagged {
        options.containers = ContainerTagging::Tagged;
    }
    if args.strict {
        options.raise_on_unknown = true;
    }

    let value = read_value(&args)?;
    tracing::debug!(kind = value.kind(), "Hashing value");

    let hasher = ContentHasher::new(options.clone());
    let digest = hasher.digest(&value).context("Hashing failed")?;

    if digest.is_degraded() {
        tracing::warn!(fallbacks = ?digest.fallbacks(), "Digest includes debug-formatted values");
    }

    if args.raw {
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(digest.as_bytes())
            .and_then(|()| stdout.flush())
            .context("Failed to write digest")?;
    } else if args.json {
        let report = HashReport {
            hex: digest.to_hex(options.hex_length),
            kind: value.kind().to_string(),
            tagged: options.containers == ContainerTagging::Tagged,
            fallbacks: digest.fallbacks().to_vec(),
        };
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize output")?;
        println!("{}", json);
    } else {
        println!("{}", digest.to_hex(options.hex_length));
    }

    Ok(())
}

fn read_value(args: &HashArgs) -> Result<Value> {
    if let Some(ref text) = args.text {
        return Ok(Value::text(text.as_str()));
    }

    if let Some(ref path) = args.file {
        return Ok(Value::bytes(read_bytes(path)?));
    }

    if let Some(ref path) = args.json_file {
        let bytes = read_bytes(path)?;
        let document: serde_json::Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;
        return Ok(Value::from(document));
    }

    // Default to stdin if no input specified
    Ok(Value::bytes(read_bytes(Path::new("-"))?))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut bytes = Vec::new();
        io::stdin()
            .read_to_end(&mut bytes)
            .context("Failed to read from stdin")?;
        return Ok(bytes);
    }

    std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
}
