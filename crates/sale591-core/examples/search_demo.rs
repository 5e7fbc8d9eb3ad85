use sale591_core::{ClientConfig, SearchClient, SearchFilter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let client = SearchClient::with_config(ClientConfig::from_env()?)?;

    let filter = SearchFilter::new()
        .with("regionid", 3) // 新北市
        .with("section", 40) // 三峽區
        .with("price", "1_1500") // 1500萬以下
        .with("shape", 2) // 1: 公寓, 2: 電梯大樓, 3: 透天厝, 4: 別墅
        .with("pattern", "2,3") // 2房, 3房
        .with("houseage", "0_20") // 20年內
        .with("publish_day", 20) // 20天內
        .with("area", "15_40") // 15-40坪
        .with("unitprice", "0_50") // 單價50萬以下
        .with("keywords", "北大");

    let result = client.search(Some(&filter), None, 1).await?;

    println!("Total houses found: {}", result.total_count);
    if let Some(status) = result.halted_on {
        println!("Stopped early on HTTP {} after {} pages", status, result.pages_fetched);
    }

    Ok(())
}
