use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use clubhouse::application::club::{AddCoach, ChangeClubOwner, CreateClub};
use clubhouse::application::collective::{
    AddPlayerToCollective, CreateCollective, RemovePlayerFromCollective,
};
use clubhouse::application::player::RegisterPlayer;
use clubhouse::application::training_session::{
    CancelTrainingSession, ChangePlayerTrainingSessionStatus, CreateTrainingSession,
};
use clubhouse::application::user::{SignUpUser, UpdateUserEmail, UpdateUserName};
use clubhouse::application::{club, collective, player, training_session, user};
use clubhouse::auth::AllowAll;
use clubhouse::command::{CommandBus, EventBus, Retry};
use clubhouse::config::Config;
use clubhouse::domain::{
    ClubRepository, CollectiveRepository, EventSerde, FederationRepository, PlayerRepository,
    TrainingSessionRepository, UserRepository,
};
use clubhouse::event::Journal;
use clubhouse::notify::ClubChannels;
use clubhouse::projection;
use clubhouse::query::PublicReads;
use clubhouse::server::{self, AppState};
use clubhouse::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init()?;

    let config = Config::from_env()?;

    let event_store = Journal::open(&config.event_journal_path, EventSerde)?;

    let read_model = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(
            SqliteConnectOptions::from_str(&config.read_model_url)?.create_if_missing(true),
        )
        .await?;

    let channels = ClubChannels::new();
    let event_bus = Arc::new(EventBus::new());

    let club_service = club::Service::from(ClubRepository::from(event_store.clone()));
    let user_service = user::Service::from(UserRepository::from(event_store.clone()));
    let player_service = player::Service::new(
        PlayerRepository::from(event_store.clone()),
        ClubRepository::from(event_store.clone()),
        FederationRepository::from(event_store.clone()),
        event_bus.clone(),
    );
    let collective_service = collective::Service::new(
        CollectiveRepository::from(event_store.clone()),
        ClubRepository::from(event_store.clone()),
    );
    let training_session_service = training_session::Service::new(
        TrainingSessionRepository::from(event_store.clone()),
        PlayerRepository::from(event_store.clone()),
    );

    let mut command_bus = CommandBus::new(
        Arc::new(AllowAll),
        Retry {
            limit: config.command_retry_limit,
            base_backoff: config.command_retry_backoff,
        },
    );

    command_bus.register::<CreateClub, _>(club_service.clone());
    command_bus.register::<ChangeClubOwner, _>(club_service.clone());
    command_bus.register::<AddCoach, _>(club_service);
    command_bus.register::<SignUpUser, _>(user_service.clone());
    command_bus.register::<UpdateUserName, _>(user_service.clone());
    command_bus.register::<UpdateUserEmail, _>(user_service);
    command_bus.register::<RegisterPlayer, _>(player_service);
    command_bus.register::<CreateCollective, _>(collective_service.clone());
    command_bus.register::<AddPlayerToCollective, _>(collective_service.clone());
    command_bus.register::<RemovePlayerFromCollective, _>(collective_service);
    command_bus.register::<CreateTrainingSession, _>(training_session_service.clone());
    command_bus.register::<CancelTrainingSession, _>(training_session_service.clone());
    command_bus.register::<ChangePlayerTrainingSessionStatus, _>(training_session_service);

    let worker = projection::Worker::new(
        event_store,
        read_model.clone(),
        channels.clone(),
        projection::Options {
            poll_interval: config.worker_poll_interval,
            batch_size: config.projection_batch_size,
            reset_read_model: config.reset_read_model,
        },
    );
    let worker_stop = worker.stop_handle();
    let worker_task = tokio::spawn(worker.run());

    let app = server::router(AppState {
        channels,
        command_bus: Arc::new(command_bus),
        public_reads: PublicReads::new(read_model),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(address = %config.bind_addr, "server is starting up");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    worker_stop.stop();
    worker_task.await??;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("installing the ctrl-c handler should not fail");
}
