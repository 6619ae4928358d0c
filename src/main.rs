//! formlift - upload a multipart form from the command line

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use formlift::{DriverKind, FieldValue, FormFields, Listener, Upload, UploadOptions, Uploader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(ValueEnum, Debug, Copy, Clone)]
enum DriverArg {
    Auto,
    Browser,
    Server,
}

#[derive(Parser, Debug)]
#[command(name = "formlift")]
#[command(about = "Upload a multipart form and report progress")]
struct Args {
    /// Destination URL
    url: String,

    /// Text field, as name=value (repeatable)
    #[arg(long = "field")]
    fields: Vec<String>,

    /// File field, as name=path or name=@path (repeatable)
    #[arg(long = "file")]
    files: Vec<String>,

    /// Extra header, as 'Name: value' (repeatable)
    #[arg(long = "header", short = 'H')]
    headers: Vec<String>,

    /// Request method
    #[arg(long, short = 'X', default_value = "POST")]
    method: String,

    /// Upload driver: auto, browser, server
    #[arg(long, value_enum, default_value = "auto")]
    driver: DriverArg,

    /// Send credentials (browser driver only)
    #[arg(long)]
    with_credentials: bool,
}

fn split_pair<'a>(value: &'a str, separator: char, what: &str) -> Result<(&'a str, &'a str)> {
    let (name, rest) = value
        .split_once(separator)
        .ok_or_else(|| anyhow!("Invalid {} '{}': expected name{}value", what, value, separator))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Invalid {} '{}': empty name", what, value));
    }
    Ok((name, rest))
}

async fn build_fields(args: &Args) -> Result<FormFields> {
    let mut fields = FormFields::new();
    for field in &args.fields {
        let (name, value) = split_pair(field, '=', "field")?;
        fields.insert(name, value);
    }
    for file in &args.files {
        let (name, path) = split_pair(file, '=', "file")?;
        let path = Path::new(path.trim_start_matches('@'));
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        fields.insert(name, FieldValue::file(data, filename));
    }
    Ok(fields)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Progress goes to stderr, the response body to stdout
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut options = UploadOptions::new(args.url.clone(), build_fields(&args).await?)
        .method(args.method.clone())
        .with_credentials(args.with_credentials);
    for header in &args.headers {
        let (name, value) = split_pair(header, ':', "header")?;
        options = options.header(name, value.trim());
    }

    let uploader = match args.driver {
        DriverArg::Auto => Upload::new(options)?,
        DriverArg::Browser => Upload::with_driver(DriverKind::Browser, options)?,
        DriverArg::Server => Upload::with_driver(DriverKind::Server, options)?,
    };

    uploader.on(Listener::state(|_, state| info!("Upload {}", state)));
    uploader.on(Listener::progress(|upload, progress| {
        info!(
            "{:>5.1}% ({}/{} bytes)",
            progress * 100.0,
            upload.uploaded_bytes(),
            upload.total_bytes()
        );
    }));

    match uploader.upload().await {
        Ok(response) => {
            info!("Server answered {}", response.status);
            match response.text() {
                Some(text) => println!("{}", text),
                None => info!("Binary response, {} bytes", response.data.as_bytes().len()),
            }
            if response.status >= 400 {
                std::process::exit(2);
            }
        }
        Err(e) => {
            error!("Upload error: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
