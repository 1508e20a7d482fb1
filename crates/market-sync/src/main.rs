//! 시장 봉 동기화 서비스 CLI.

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use market_core::{init_logging, Instrument, InstrumentId, Interval, LogConfig, TimeRange};
use market_data::{
    BarFetcher, Database, DatabaseConfig, HttpBarFetcher, InstrumentRegistry, MarketStore,
    MemoryBackend, PgInstrumentRegistry, StaticRegistry, TimescaleBackend,
};
use market_quality::{QualityChecker, QualityConfig};
use market_sync::api::{create_router, AppState};
use market_sync::modules::{
    IndicatorSync, JobRegistry, Scheduler, SyncOptions, SyncOrchestrator,
};
use market_sync::ServiceConfig;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "market-sync")]
#[command(about = "Market bar synchronization & data-quality service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 인메모리 저장소 사용 (DATABASE_URL 불필요)
    #[arg(long)]
    memory: bool,

    /// 고정 종목 목록 (쉼표로 구분, 예: "600519.SH,000001.SZ")
    #[arg(long, value_delimiter = ',')]
    instruments: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 구간 전체 동기화 (symbol/venue 생략 시 활성 종목 전체)
    SyncFull {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        venue: Option<String>,
        /// 봉 간격 (기본: SYNC_INTERVAL)
        #[arg(long)]
        interval: Option<String>,
        /// 시작 시각 (RFC3339, 기본: end - SYNC_LOOKBACK_DAYS)
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// 종료 시각 (RFC3339, 기본: 현재)
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },

    /// 커서 기반 증분 동기화
    Incremental {
        #[arg(long)]
        interval: Option<String>,
    },

    /// 데이터 품질 검사 (symbol/venue 생략 시 전체 리포트)
    Quality {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        venue: Option<String>,
    },

    /// 저장된 봉으로 기술 지표 재계산
    Indicators,

    /// 데몬 모드: 스케줄러 + HTTP API
    Daemon,
}

/// 명령 실행에 필요한 구성 요소.
struct Services {
    orchestrator: SyncOrchestrator,
    checker: QualityChecker,
    registry: Arc<dyn InstrumentRegistry>,
    store: MarketStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = format!(
        "market_sync={0},market_data={0},market_quality={0},market_core={0},tower_http=info",
        cli.log_level
    );
    init_logging(LogConfig::from_env(&default_filter))?;

    info!("Market Sync 시작");

    let config = ServiceConfig::from_env()?;
    let shutdown = CancellationToken::new();
    let services = build_services(&cli, &config, shutdown.clone()).await?;

    match cli.command {
        Commands::SyncFull {
            symbol,
            venue,
            interval,
            start,
            end,
        } => {
            tokio::spawn(shutdown_signal(shutdown.clone()));
            let interval = parse_interval(interval.as_deref(), config.sync.interval)?;
            let end = end.unwrap_or_else(Utc::now);
            let start = start.unwrap_or(end - Duration::days(config.sync.lookback_days));
            let range = TimeRange::new(start, end)?;

            match (symbol, venue) {
                (Some(symbol), Some(venue)) => {
                    let written = services
                        .orchestrator
                        .sync_instrument(&symbol, &venue, interval, range)
                        .await?;
                    info!(%symbol, %venue, %interval, written, "단일 종목 동기화 완료");
                }
                (None, None) => {
                    let report = services.orchestrator.sync_fleet(interval, range).await?;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                _ => anyhow::bail!("--symbol과 --venue는 함께 지정해야 합니다"),
            }
        }
        Commands::Incremental { interval } => {
            tokio::spawn(shutdown_signal(shutdown.clone()));
            let interval = parse_interval(interval.as_deref(), config.sync.interval)?;
            let report = services.orchestrator.incremental_update(interval).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Quality { symbol, venue } => match (symbol, venue) {
            (Some(symbol), Some(venue)) => {
                let results = services.checker.check_registered(&symbol, &venue).await?;
                println!("{}", serde_json::to_string_pretty(&results)?);
            }
            (None, None) => {
                let report = services.checker.generate_report().await?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            _ => anyhow::bail!("--symbol과 --venue는 함께 지정해야 합니다"),
        },
        Commands::Indicators => {
            let stats = IndicatorSync::new(services.store.clone())
                .sync_registered(services.registry.as_ref(), Utc::now())
                .await?;
            stats.log_summary("지표 동기화");
        }
        Commands::Daemon => run_daemon(services, &config, shutdown).await?,
    }

    Ok(())
}

/// 저장소, 레지스트리, 업스트림 클라이언트를 조립합니다.
async fn build_services(
    cli: &Cli,
    config: &ServiceConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<Services> {
    let static_instruments = parse_instruments(&cli.instruments)?;

    let (store, registry): (MarketStore, Arc<dyn InstrumentRegistry>) = if cli.memory {
        info!("인메모리 저장소 사용");
        (
            MarketStore::new(Arc::new(MemoryBackend::new())),
            Arc::new(StaticRegistry::new(static_instruments)),
        )
    } else {
        let url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL 환경변수가 필요합니다 (또는 --memory)")?;
        let db = Database::connect(
            &DatabaseConfig::new(url).with_max_connections(config.db_max_connections),
        )
        .await?;
        db.migrate().await?;
        info!("데이터베이스 연결 성공");

        let registry: Arc<dyn InstrumentRegistry> = if static_instruments.is_empty() {
            Arc::new(PgInstrumentRegistry::new(db.pool().clone()))
        } else {
            Arc::new(StaticRegistry::new(static_instruments))
        };
        (MarketStore::new(Arc::new(TimescaleBackend::new(db))), registry)
    };

    let fetcher: Arc<dyn BarFetcher> = Arc::new(HttpBarFetcher::new(
        config.upstream.base_url.clone(),
        config.upstream.timeout(),
    )?);

    let mut orchestrator = SyncOrchestrator::new(
        registry.clone(),
        fetcher,
        store.clone(),
        SyncOptions::from(&config.sync),
        shutdown,
    );
    if config.sync.indicator_sync_enabled {
        orchestrator = orchestrator.with_indicator_sync(IndicatorSync::new(store.clone()));
    }

    let checker = QualityChecker::with_config(
        store.clone(),
        registry.clone(),
        QualityConfig {
            window_days: config.quality_window_days,
            interval: config.sync.interval,
            concurrency: config.sync.max_concurrency,
        },
    );

    Ok(Services {
        orchestrator,
        checker,
        registry,
        store,
    })
}

async fn run_daemon(
    services: Services,
    config: &ServiceConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let scheduler = Scheduler::new(
        services.orchestrator.clone(),
        config.schedule.clone(),
        config.sync.interval,
        shutdown.clone(),
    );
    let scheduler_status = scheduler.status();
    let scheduler_task = tokio::spawn(scheduler.run());

    let state = Arc::new(AppState::new(
        services.orchestrator,
        services.checker,
        JobRegistry::new(shutdown.clone()),
        scheduler_status,
        config.sync.interval,
    ));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("바인드 실패: {}", addr))?;
    info!(%addr, "HTTP 서버 시작");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = scheduler_task.await {
        warn!(error = %e, "스케줄러 태스크 종료 실패");
    }
    info!("Market Sync 종료");
    Ok(())
}

fn parse_interval(raw: Option<&str>, default: Interval) -> anyhow::Result<Interval> {
    match raw {
        Some(s) => s.parse().map_err(anyhow::Error::msg),
        None => Ok(default),
    }
}

fn parse_instruments(codes: &[String]) -> anyhow::Result<Vec<Instrument>> {
    codes
        .iter()
        .map(|code| {
            let id: InstrumentId = code.trim().parse().map_err(anyhow::Error::msg)?;
            Ok(Instrument::new(id.symbol, id.venue))
        })
        .collect()
}

/// Ctrl+C 또는 SIGTERM을 받으면 토큰을 취소합니다.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Ctrl+C 핸들러 설치 실패");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "SIGTERM 핸들러 설치 실패");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Ctrl+C 수신, 종료 시작");
        }
        _ = terminate => {
            warn!("SIGTERM 수신, 종료 시작");
        }
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();
    info!("종료 신호 전파 완료");
}
