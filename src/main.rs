use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use navigator::{
    infrastructure::cli::Cli,
    utils::{initialize_logging, initialize_panic_handler},
    BackStackSurface, Config, Navigator, Route, Target,
};

const FILTER_RESULT: &str = "FILTER_RESULT";

#[derive(Debug, Serialize, Deserialize)]
struct Products;

impl Route for Products {
    const NAME: &'static str = "products";
    const CARRIES_DATA: bool = false;
}

#[derive(Debug, Serialize, Deserialize)]
struct ProductDetail {
    id: u64,
}

impl Route for ProductDetail {
    const NAME: &'static str = "product_detail";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PriceRange {
    min: u32,
    max: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Filter {
    current: Option<PriceRange>,
}

impl Route for Filter {
    const NAME: &'static str = "filter";
}

fn print_stack(label: &str, surface: &BackStackSurface) {
    let routes: Vec<String> = surface
        .stack()
        .iter()
        .map(|target| target.route().to_string())
        .collect();
    println!("{label}: [{}]", routes.join(" > "));
}

async fn tokio_main() -> Result<()> {
    initialize_logging()?;

    initialize_panic_handler()?;

    let args = <Cli as Parser>::parse();
    let config = Config::new()?;

    let (navigator, runtime) = Navigator::new(&config)?;
    let router = navigator.router();

    // Issued before any surface exists; these wait in the queue
    navigator.navigate(&Products);
    navigator.navigate(&ProductDetail { id: 1 });
    println!("queued before attach: {}", router.pending_len().await);

    tokio::time::sleep(Duration::from_millis(args.attach_delay_ms)).await;
    let surface = BackStackSurface::with_routes([
        Products::NAME,
        ProductDetail::NAME,
        Filter::NAME,
        "users",
    ]);
    router.attach(surface.clone());
    router.settled().await;
    print_stack("after attach", &surface);

    let (result_tx, result_rx) = oneshot::channel();
    navigator.get_result::<PriceRange, _>("ProductsScreen", FILTER_RESULT, move |range| {
        let _ = result_tx.send(range);
    });

    router.go_back();
    navigator.navigate(&Filter { current: None });
    router.settled().await;
    print_stack("filter open", &surface);

    let range = PriceRange {
        min: args.min_price,
        max: args.max_price,
    };
    navigator.go_back_with(FILTER_RESULT, &range, Some(Target::named(Products::NAME)));

    let received = tokio::time::timeout(Duration::from_secs(5), result_rx)
        .await?
        .map_err(|_| eyre!("Filter result was never delivered"))?;
    println!("products received {received:?}");
    print_stack("after result", &surface);

    // Unknown destinations are logged and ignored
    router.go_to("settings");
    router.go_back_and_go_to("users");
    router.settled().await;
    print_stack("final", &surface);

    runtime.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = tokio_main().await {
        eprintln!("{} error: Something went wrong", env!("CARGO_PKG_NAME"));
        Err(e)
    } else {
        Ok(())
    }
}
