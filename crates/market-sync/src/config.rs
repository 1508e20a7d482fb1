//! 환경변수 기반 설정 모듈.

use chrono_tz::Tz;
use market_core::Interval;
use std::time::Duration;

use crate::error::{Result, SyncError};

/// 서비스 전체 설정
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// 데이터베이스 URL (`--memory` 실행 시 불필요)
    pub database_url: Option<String>,
    /// 연결 풀 크기
    pub db_max_connections: u32,
    /// 업스트림 설정
    pub upstream: UpstreamConfig,
    /// 동기화 설정
    pub sync: SyncSettings,
    /// 스케줄러 설정
    pub schedule: ScheduleConfig,
    /// 품질 검사 구간 (일)
    pub quality_window_days: i64,
    /// HTTP 서버 설정
    pub server: ServerConfig,
}

/// 업스트림 봉 데이터 제공자 설정
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

/// 동기화 설정
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// 업스트림 조회 최대 시도 횟수
    pub max_attempts: u32,
    /// 첫 재시도 대기 (밀리초)
    pub backoff_base_ms: u64,
    /// 재시도 대기 상한 (밀리초)
    pub backoff_max_ms: u64,
    /// 종목 간 딜레이 (밀리초)
    pub request_delay_ms: u64,
    /// 동시 처리 종목 수
    pub max_concurrency: usize,
    /// 배치 거부 임계값 (잘못된 봉 비율)
    pub max_invalid_ratio: f64,
    /// 업스트림 조회 타임아웃 (초)
    pub fetch_timeout_secs: u64,
    /// 저장 타임아웃 (초)
    pub write_timeout_secs: u64,
    /// 최초 동기화 시 조회 기간 (일)
    pub lookback_days: i64,
    /// 스케줄러가 동기화하는 봉 간격
    pub interval: Interval,
    /// 동기화 후 지표 재계산 여부
    pub indicator_sync_enabled: bool,
}

/// 스케줄러 설정
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// 틱 주기 (분)
    pub tick_minutes: u64,
    /// 실행 시각 (0-23)
    pub run_hour: u32,
    /// 실행 시각 기준 시간대
    pub timezone: Tz,
}

/// HTTP 서버 설정
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 8000,
            request_delay_ms: 500,
            max_concurrency: 4,
            max_invalid_ratio: 0.5,
            fetch_timeout_secs: 30,
            write_timeout_secs: 30,
            lookback_days: 30,
            interval: Interval::D1,
            indicator_sync_enabled: true,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_minutes: 60,
            run_hour: 2,
            timezone: chrono_tz::Asia::Shanghai,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 10,
            upstream: UpstreamConfig::default(),
            sync: SyncSettings::default(),
            schedule: ScheduleConfig::default(),
            quality_window_days: 30,
            server: ServerConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// 환경변수에서 설정 로드 (`.env` 파일 포함)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let interval: Interval = match std::env::var("SYNC_INTERVAL") {
            Ok(v) => v.parse().map_err(SyncError::Config)?,
            Err(_) => defaults.sync.interval,
        };

        let timezone: Tz = match std::env::var("SCHEDULE_TIMEZONE") {
            Ok(v) => v
                .parse()
                .map_err(|e| SyncError::Config(format!("SCHEDULE_TIMEZONE: {}", e)))?,
            Err(_) => defaults.schedule.timezone,
        };

        let config = Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            db_max_connections: env_var_parse("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            upstream: UpstreamConfig {
                base_url: std::env::var("UPSTREAM_BASE_URL")
                    .unwrap_or(defaults.upstream.base_url),
                timeout_secs: env_var_parse("UPSTREAM_TIMEOUT_SECS", defaults.upstream.timeout_secs),
            },
            sync: SyncSettings {
                max_attempts: env_var_parse("SYNC_MAX_ATTEMPTS", defaults.sync.max_attempts),
                backoff_base_ms: env_var_parse("SYNC_BACKOFF_BASE_MS", defaults.sync.backoff_base_ms),
                backoff_max_ms: env_var_parse("SYNC_BACKOFF_MAX_MS", defaults.sync.backoff_max_ms),
                request_delay_ms: env_var_parse(
                    "SYNC_REQUEST_DELAY_MS",
                    defaults.sync.request_delay_ms,
                ),
                max_concurrency: env_var_parse("SYNC_MAX_CONCURRENCY", defaults.sync.max_concurrency),
                max_invalid_ratio: env_var_parse(
                    "SYNC_MAX_INVALID_RATIO",
                    defaults.sync.max_invalid_ratio,
                ),
                fetch_timeout_secs: env_var_parse(
                    "UPSTREAM_TIMEOUT_SECS",
                    defaults.sync.fetch_timeout_secs,
                ),
                write_timeout_secs: env_var_parse(
                    "SYNC_WRITE_TIMEOUT_SECS",
                    defaults.sync.write_timeout_secs,
                ),
                lookback_days: env_var_parse("SYNC_LOOKBACK_DAYS", defaults.sync.lookback_days),
                interval,
                indicator_sync_enabled: env_var_bool(
                    "INDICATOR_SYNC_ENABLED",
                    defaults.sync.indicator_sync_enabled,
                ),
            },
            schedule: ScheduleConfig {
                tick_minutes: env_var_parse("SCHEDULE_TICK_MINUTES", defaults.schedule.tick_minutes),
                run_hour: env_var_parse("SCHEDULE_RUN_HOUR", defaults.schedule.run_hour),
                timezone,
            },
            quality_window_days: env_var_parse("QUALITY_WINDOW_DAYS", defaults.quality_window_days),
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: env_var_parse("SERVER_PORT", defaults.server.port),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// 값 범위 검증
    pub fn validate(&self) -> Result<()> {
        if self.schedule.run_hour > 23 {
            return Err(SyncError::Config(format!(
                "SCHEDULE_RUN_HOUR는 0-23 이어야 합니다: {}",
                self.schedule.run_hour
            )));
        }
        if self.schedule.tick_minutes == 0 {
            return Err(SyncError::Config("SCHEDULE_TICK_MINUTES는 0보다 커야 합니다".into()));
        }
        if self.sync.max_attempts == 0 {
            return Err(SyncError::Config("SYNC_MAX_ATTEMPTS는 1 이상이어야 합니다".into()));
        }
        if !(0.0..=1.0).contains(&self.sync.max_invalid_ratio) {
            return Err(SyncError::Config(format!(
                "SYNC_MAX_INVALID_RATIO는 0.0-1.0 이어야 합니다: {}",
                self.sync.max_invalid_ratio
            )));
        }
        Ok(())
    }

    /// 서버 바인드 주소
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl SyncSettings {
    /// 종목 간 딜레이를 Duration으로 반환
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ScheduleConfig {
    /// 틱 주기를 Duration으로 반환
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_minutes * 60)
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.sync.max_invalid_ratio, 0.5);
        assert_eq!(config.sync.lookback_days, 30);
        assert_eq!(config.schedule.run_hour, 2);
        assert_eq!(config.schedule.tick(), Duration::from_secs(3600));
        assert_eq!(config.bind_addr(), "0.0.0.0:8081");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServiceConfig::default();
        config.schedule.run_hour = 24;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.sync.max_invalid_ratio = 1.5;
        assert!(config.validate().is_err());
    }
}
