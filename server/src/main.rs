#![allow(dead_code)]

mod digest;
mod email;
mod error;
mod model;
mod prompt;
mod routes;
mod server_config;
mod testing;
mod util;

use std::{env, net::SocketAddr, sync::Arc};

use axum::Router;
use digest::{stores::DigestStore, DigestDistributor, DigestOrchestrator, DigestSettings};
use email::mailer::SmtpMailer;
use mimalloc::MiMalloc;
use model::{daily_digest::PgDigestStore, email_message::PgMessageStore};
use prompt::GenerationClient;
use routes::AppRouter;
use sea_orm::{ConnectOptions, Database};
use server_config::cfg;
use tokio::{signal, task::JoinHandle};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

#[derive(Clone)]
struct ServerState {
    pub http_client: HttpClient,
    pub orchestrator: Arc<DigestOrchestrator>,
    pub distributor: Arc<DigestDistributor>,
    pub digests: Arc<dyn DigestStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL is not set in .env file");
    let mut db_options = ConnectOptions::new(db_url);
    db_options.sqlx_logging(false);

    let conn = Database::connect(db_options)
        .await
        .expect("Database connection failed");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let http_client = reqwest::ClientBuilder::new().use_rustls_tls().build()?;

    let message_store = Arc::new(PgMessageStore::new(conn.clone()));
    let digest_store: Arc<dyn DigestStore> = Arc::new(PgDigestStore::new(conn.clone()));
    let generator = Arc::new(GenerationClient::from_config(http_client.clone()));

    let orchestrator = Arc::new(DigestOrchestrator::new(
        message_store,
        digest_store.clone(),
        generator,
        DigestSettings::from_config(),
    ));
    let mailer = Arc::new(SmtpMailer::from_config().expect("SMTP mailer failed to build"));
    let distributor = Arc::new(DigestDistributor::from_config(digest_store.clone(), mailer));

    let state = ServerState {
        http_client,
        orchestrator: orchestrator.clone(),
        distributor: distributor.clone(),
        digests: digest_store,
    };

    let router = AppRouter::create(state.clone());

    let mut scheduler = JobScheduler::new()
        .await
        .expect("Failed to create scheduler");

    {
        let orchestrator = orchestrator.clone();
        let distributor = distributor.clone();
        scheduler
            .add(Job::new_async(
                cfg.digest.schedule.as_str(),
                move |uuid, mut l| {
                    let orchestrator = orchestrator.clone();
                    let distributor = distributor.clone();
                    Box::pin(async move {
                        let date = util::local_today();
                        tracing::info!("Running daily digest job {} for {}", uuid, date);
                        match orchestrator.run_for_date(date).await {
                            Ok(Some(digest)) if cfg.digest.auto_distribute => {
                                match distributor.distribute(digest.id).await {
                                    Ok(_) => {
                                        tracing::info!("Digest {} for {} distributed", digest.id, date);
                                    }
                                    Err(e) => {
                                        tracing::error!(
                                            "Failed to distribute digest {} for {}: {:?}",
                                            digest.id,
                                            date,
                                            e
                                        );
                                    }
                                }
                            }
                            Ok(Some(digest)) => {
                                tracing::info!(
                                    "Digest {} for {} ready, auto distribution disabled",
                                    digest.id,
                                    date
                                );
                            }
                            Ok(None) => {
                                tracing::info!("No digest produced for {}", date);
                            }
                            Err(e) => {
                                tracing::error!("Digest run for {} failed: {:?}", date, e);
                            }
                        }

                        let next_tick = l.next_tick_for_job(uuid).await;
                        if let Ok(Some(ts)) = next_tick {
                            tracing::info!("Next daily digest run at {:?}", ts);
                        }
                    })
                },
            )?)
            .await?;
    }

    scheduler.set_shutdown_handler(Box::new(move || {
        Box::pin(async move {
            tracing::info!("Shutting down scheduler");
        })
    }));

    match scheduler.start().await {
        Ok(_) => {
            println!("-------- SCHEDULER STARTED --------");
        }
        Err(e) => {
            println!("Failed to start scheduler: {:?}", e);
        }
    }

    run_server(router, scheduler).await?;

    Ok(())
}

async fn shutdown_signal(mut scheduler: JobScheduler) {
    if env::var("NO_SHUTDOWN").unwrap_or("false".to_string()) == "true" {
        return;
    }

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            scheduler.shutdown().await.unwrap();
            println!("Cleanups done, shutting down");
            std::process::exit(0);

        },
        _ = terminate => {
            scheduler.shutdown().await.unwrap();
            println!("Cleanups done, shutting down");
            std::process::exit(0);
        },
    }
}

fn run_server(router: Router, scheduler: JobScheduler) -> JoinHandle<()> {
    tokio::spawn(async {
        let port = env::var("PORT").unwrap_or("5006".to_string());
        tracing::info!("Mailbrief server running on http://0.0.0.0:{}", port);
        println!("{}", *server_config::cfg);

        let addr = SocketAddr::from(([0, 0, 0, 0], port.parse::<u16>().unwrap()));
        tracing::debug!("listening on {addr}");
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(scheduler))
            .await
            .unwrap();
    })
}
