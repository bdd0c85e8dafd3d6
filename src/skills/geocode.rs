use super::SkillError;
use serde::Deserialize;

const UNKNOWN: &str = "Unknown";

#[derive(Deserialize, Default)]
struct ReverseResponse {
    #[serde(default)]
    address: Address,
}

#[derive(Deserialize, Default)]
struct Address {
    city: Option<String>,
    town: Option<String>,
}

/// City (or town) at the given coordinates via Nominatim reverse geocoding.
pub(super) async fn locality(client: &reqwest::Client, base_url: &str, lat: f64, lon: f64) -> String {
    match lookup(client, base_url, lat, lon).await {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(error = %e, "reverse geocoding failed");
            UNKNOWN.to_string()
        }
    }
}

async fn lookup(client: &reqwest::Client, base_url: &str, lat: f64, lon: f64) -> Result<String, SkillError> {
    let body = client
        .get(format!("{}/reverse", base_url))
        .query(&[
            ("format", "json".to_string()),
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
        ])
        .send()
        .await?
        .text()
        .await?;

    let parsed: ReverseResponse = serde_json::from_str(&body)?;
    Ok(pick_locality(parsed.address))
}

fn pick_locality(address: Address) -> String {
    address
        .city
        .or(address.town)
        .unwrap_or_else(|| UNKNOWN.to_string())
}
