//! Command handlers for blob transfers

use anyhow::{Context as _, Result};
use blobio::{
    open_blob, stat, write_blob, AzureClientFactory, BlobAddress, ClientCache, Config, Context,
    ObjectInfo,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Shared state of one CLI invocation: the operation context and display options
pub struct Session {
    ctx: Context,
    buffer_size: usize,
    progress: bool,
}

impl Session {
    /// Build a session with a client cache configured from `config`
    pub fn new(config: &Config, progress: bool) -> Result<Self> {
        let cache = Arc::new(ClientCache::new(
            Arc::new(AzureClientFactory::new()),
            config.client_options(),
        ));
        let ctx = config.context()?.with_client_cache(cache);
        debug!(
            "Using {} workers of at least {} bytes, buffer {} bytes",
            ctx.concurrency().max_workers(),
            ctx.concurrency().min_bytes_per_worker(),
            config.buffer_size()
        );
        Ok(Self {
            ctx,
            buffer_size: config.buffer_size(),
            progress,
        })
    }

    /// Print information about a blob or prefix
    pub fn stat(&self, address: &BlobAddress, json: bool) -> Result<()> {
        let info = stat(&self.ctx, address)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            print_info(&info);
        }
        Ok(())
    }

    /// Copy up to `length` bytes starting at `offset` to stdout
    pub fn cat(&self, address: &BlobAddress, offset: u64, length: Option<u64>) -> Result<()> {
        let mut reader = open_blob(&self.ctx, address, self.buffer_size)?;
        if offset > 0 {
            reader.seek(SeekFrom::Start(offset))?;
        }

        let stdout = io::stdout();
        let mut out = stdout.lock();
        let copied = match length {
            Some(length) => io::copy(&mut reader.take(length), &mut out)?,
            None => io::copy(&mut reader, &mut out)?,
        };
        out.flush()?;
        debug!("Wrote {} bytes of {} to stdout", copied, address);
        Ok(())
    }

    /// Download a blob into `output`
    pub fn get(&self, address: &BlobAddress, output: &Path) -> Result<()> {
        let reader = open_blob(&self.ctx, address, self.buffer_size)?;
        let size = reader.size();
        let file = File::create(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        let mut writer = BufWriter::new(file);

        let copied = match self.progress_bar(size) {
            Some(pb) => {
                let copied = io::copy(&mut pb.wrap_read(reader), &mut writer)?;
                pb.finish_and_clear();
                copied
            }
            None => {
                let mut reader = reader;
                io::copy(&mut reader, &mut writer)?
            }
        };
        writer.flush()?;
        info!("Downloaded {} bytes to {}", copied, output.display());
        Ok(())
    }

    /// Upload `input`, or stdin for `-`, to a blob
    pub fn put(&self, input: &Path, address: &BlobAddress) -> Result<()> {
        let written = if input == Path::new("-") {
            write_blob(&self.ctx, address, io::stdin())?
        } else {
            let file = File::open(input)
                .with_context(|| format!("Failed to open {}", input.display()))?;
            let size = file.metadata()?.len();
            match self.progress_bar(size) {
                Some(pb) => {
                    let written = write_blob(&self.ctx, address, pb.wrap_read(file))?;
                    pb.finish_and_clear();
                    written
                }
                None => write_blob(&self.ctx, address, file)?,
            }
        };
        info!("Uploaded {} bytes to {}", written, address);
        Ok(())
    }

    fn progress_bar(&self, total: u64) -> Option<ProgressBar> {
        if !self.progress {
            return None;
        }
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    }
}

fn print_info(info: &ObjectInfo) {
    println!("Name:          {}", info.name);
    println!("Kind:          {}", if info.is_dir { "prefix" } else { "blob" });
    println!("Size:          {}", info.size);
    match info.last_modified {
        Some(ts) => println!("Last modified: {}", ts.to_rfc3339()),
        None => println!("Last modified: -"),
    }
}
