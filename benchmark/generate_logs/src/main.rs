use chrono::{DateTime, Duration, Utc};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Apache/Nginx combined log
    Apache,
    /// One JSON object per line
    Json,
}

#[derive(Parser)]
#[command(name = "generate_logs")]
#[command(about = "Generate synthetic web access logs for benchmarking")]
struct Args {
    /// Output file path
    #[arg(short, long)]
    output: String,

    /// Number of log lines to generate
    #[arg(short, long, default_value = "1000000")]
    lines: usize,

    /// Log format
    #[arg(short, long, value_enum, default_value = "apache")]
    format: Format,

    /// Share of requests made by crawlers and HTTP libraries (0.0 - 1.0)
    #[arg(short, long, default_value = "0.1")]
    bot_rate: f64,

    /// Share of requests answered with 4xx/5xx (0.0 - 1.0)
    #[arg(short, long, default_value = "0.05")]
    error_rate: f64,

    /// Days of traffic the timestamps are spread over
    #[arg(short, long, default_value = "7")]
    days: i64,

    /// Seed for reproducible output
    #[arg(short, long)]
    seed: Option<u64>,
}

const PATHS: &[&str] = &[
    "/", "/index.html", "/about", "/contact", "/products", "/products/42",
    "/cart", "/checkout", "/api/users", "/api/products", "/api/orders",
    "/login", "/logout", "/static/css/style.css", "/static/js/app.js",
    "/static/img/logo.png", "/blog", "/blog/2025/05/launch", "/favicon.ico",
];

const METHODS: &[&str] = &["GET", "GET", "GET", "GET", "GET", "POST", "PUT", "DELETE"];

const REFERERS: &[&str] = &[
    "-", "-", "-", "https://www.google.com/", "https://duckduckgo.com/",
    "https://example.com/", "https://example.com/products",
];

const BROWSERS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Chrome/124.0 Mobile Safari/537.36",
];

const BOTS: &[&str] = &[
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
    "Mozilla/5.0 (compatible; bingbot/2.0; +http://www.bing.com/bingbot.htm)",
    "Mozilla/5.0 (compatible; YandexBot/3.0)",
    "facebookexternalhit/1.1",
    "curl/8.4.0",
    "python-requests/2.31.0",
    "Go-http-client/1.1",
    "Pingdom.com_bot_version_1.4",
];

const OK_STATUSES: &[u16] = &[200, 200, 200, 200, 200, 201, 204, 301, 304];
const ERROR_STATUSES: &[u16] = &[400, 401, 403, 404, 404, 500, 502, 503];

/// Keys understood by the JSON access-log parser
#[derive(Serialize)]
struct JsonLog<'a> {
    time: String,
    forwardedfor: String,
    method: &'a str,
    path: &'a str,
    version: &'a str,
    code: u16,
    size: u32,
    referer: &'a str,
    agent: &'a str,
}

struct Request<'a> {
    timestamp: DateTime<Utc>,
    ip: String,
    method: &'a str,
    path: &'a str,
    status: u16,
    size: u32,
    referer: &'a str,
    agent: &'a str,
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();

    let file = File::create(&args.output)?;
    let mut writer = BufWriter::with_capacity(1024 * 1024, file); // 1MB buffer

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let start_time = Utc::now() - Duration::days(args.days);
    let step_ms = (args.days.max(1) * 86_400_000 / args.lines.max(1) as i64).max(1);

    let pb = ProgressBar::new(args.lines as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap()
        .progress_chars("#>-"));

    for i in 0..args.lines {
        let timestamp = start_time + Duration::milliseconds(i as i64 * step_ms + rng.gen_range(0..step_ms));
        let is_bot = rng.r#gen::<f64>() < args.bot_rate;
        let is_error = rng.r#gen::<f64>() < args.error_rate;
        let request = generate_request(&mut rng, timestamp, is_bot, is_error);

        let line = match args.format {
            Format::Apache => apache_line(&request),
            Format::Json => json_line(&request)?,
        };
        writeln!(writer, "{}", line)?;

        if i % 10000 == 0 {
            pb.set_position(i as u64);
        }
    }

    pb.finish_with_message("Done!");
    writer.flush()?;

    // Print file size
    let metadata = std::fs::metadata(&args.output)?;
    let size_mb = metadata.len() as f64 / (1024.0 * 1024.0);
    println!("Generated {} lines ({:.2} MB) to {}", args.lines, size_mb, args.output);

    Ok(())
}

fn generate_request(rng: &mut StdRng, timestamp: DateTime<Utc>, is_bot: bool, is_error: bool) -> Request<'static> {
    // humans come from a small pool so they form multi-request sessions
    let ip = if is_bot {
        format!("66.249.{}.{}", rng.gen_range(64..80), rng.gen_range(1..255))
    } else {
        format!("203.0.113.{}", rng.gen_range(1..120))
    };
    let status = if is_error {
        *ERROR_STATUSES.choose(rng).unwrap()
    } else {
        *OK_STATUSES.choose(rng).unwrap()
    };
    let size = match status {
        204 | 304 => 0,
        s if s >= 400 => rng.gen_range(50..400),
        _ => rng.gen_range(500..50_000),
    };

    Request {
        timestamp,
        ip,
        method: if is_bot { "GET" } else { *METHODS.choose(rng).unwrap() },
        path: *PATHS.choose(rng).unwrap(),
        status,
        size,
        referer: if is_bot { "-" } else { *REFERERS.choose(rng).unwrap() },
        agent: if is_bot { *BOTS.choose(rng).unwrap() } else { *BROWSERS.choose(rng).unwrap() },
    }
}

fn apache_line(request: &Request) -> String {
    let ts = request.timestamp.format("%d/%b/%Y:%H:%M:%S %z");
    format!(
        "{} - - [{}] \"{} {} HTTP/1.1\" {} {} \"{}\" \"{}\"",
        request.ip, ts, request.method, request.path, request.status, request.size,
        request.referer, request.agent
    )
}

fn json_line(request: &Request) -> std::io::Result<String> {
    let log = JsonLog {
        time: request.timestamp.format("%d/%b/%Y:%H:%M:%S %z").to_string(),
        forwardedfor: request.ip.clone(),
        method: request.method,
        path: request.path,
        version: "HTTP/1.1",
        code: request.status,
        size: request.size,
        referer: request.referer,
        agent: request.agent,
    };
    serde_json::to_string(&log).map_err(std::io::Error::other)
}
