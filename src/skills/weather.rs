use super::SkillError;
use serde::Deserialize;

#[derive(Deserialize)]
struct WeatherResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    main: Main,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Deserialize, Default)]
struct Main {
    #[serde(default)]
    temp: f64,
}

#[derive(Deserialize)]
struct Condition {
    #[serde(default)]
    description: String,
}

/// Current conditions from the OpenWeatherMap `weather` endpoint.
pub(super) async fn fetch(
    client: &reqwest::Client,
    base_url: &str,
    query: &[(&str, String)],
) -> Result<String, SkillError> {
    let res = client
        .get(format!("{}/weather", base_url))
        .query(query)
        .send()
        .await?;

    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), body = %body, "weather API error");
        return Ok(format!("Weather Error: {}", status.as_u16()));
    }

    let parsed: WeatherResponse = serde_json::from_str(&body)?;
    format_report(&parsed)
}

fn format_report(report: &WeatherResponse) -> Result<String, SkillError> {
    let condition = report
        .weather
        .first()
        .ok_or(SkillError::Missing("weather conditions"))?;
    Ok(format!(
        "Weather in {}: {:.1}°C, {}.",
        report.name, report.main.temp, condition.description
    ))
}
