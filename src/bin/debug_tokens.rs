use shipping_guide::layout::sort_reading_order;
use shipping_guide::{extract_tokens, ExtractionConfig};
use std::env;
use std::process;

fn main() {
    env_logger::init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("Usage: debug_tokens <pdf_file>");
        process::exit(1);
    };

    let mut tokens = match extract_tokens(&path) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    sort_reading_order(&mut tokens, ExtractionConfig::default().line_tolerance);

    println!("{} tokens in reading order:", tokens.len());
    for t in &tokens {
        println!(
            "  x={:6.1} y={:6.1} w={:5.1} h={:4.1} \"{}\"",
            t.x, t.y, t.width, t.height, t.text
        );
    }
}
