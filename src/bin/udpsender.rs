//! Sends each line typed on stdin as a UDP datagram.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UdpSocket;

#[derive(Parser)]
#[command(name = "udpsender")]
#[command(about = "Send stdin lines as UDP datagrams", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "localhost:42069")]
    target: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(&cli.target).await?;

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        if let Err(e) = socket.send(format!("{line}\n").as_bytes()).await {
            eprintln!("{e}");
        }
    }
}
