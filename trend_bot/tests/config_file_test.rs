use std::io::Write;

use trend_bot::config::load_config_path;

#[test]
fn loads_and_validates_a_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        symbol = "BTC/USDT"
        primary_exchange = "bybit"
        fallback_exchanges = ["binance", "okx"]
        timeframes = ["1d", "4h", "1h", "15m"]
        notification_times = ["09:00", "17:00", "01:00"]
        "#
    )
    .unwrap();

    let config = load_config_path(file.path()).unwrap();
    assert_eq!(config.symbol, "BTC/USDT");
    assert_eq!(config.fallback_exchanges.len(), 2);
    assert_eq!(config.notification_schedule().unwrap().len(), 3);
}

#[test]
fn missing_file_reports_its_path() {
    let err = load_config_path("/definitely/not/here.toml").unwrap_err();
    assert!(format!("{err:#}").contains("/definitely/not/here.toml"));
}
