//! Accepts connections and prints every parsed request.

use clap::Parser;
use tokio::net::TcpListener;

use raw_http::http::Request;

#[derive(Parser)]
#[command(name = "tcplistener")]
#[command(about = "Print each HTTP request received on a TCP port", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "localhost:42069")]
    address: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let listener = TcpListener::bind(&cli.address).await?;

    loop {
        let (mut stream, _) = listener.accept().await?;
        println!("A connection has been accepted");

        let Some(request) = Request::from_reader(&mut stream).await? else {
            println!("Connection closed without a request");
            continue;
        };

        println!("Request line:");
        println!("- Method: {}", request.request_line.method);
        println!("- Target: {}", request.request_line.target);
        println!("- Version: {}", request.request_line.http_version);

        println!("Headers:");
        for (name, value) in request.headers.iter() {
            println!("- {name}: {value}");
        }

        println!("Body:");
        println!("{}", String::from_utf8_lossy(&request.body));
    }
}
