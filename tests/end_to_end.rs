//! End-to-end scenarios: commands through the bus, events in the store,
//! the projection worker materializing the read model, and notifications
//! fanned out per club.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use futures::TryStreamExt;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tokio::sync::mpsc;

use clubhouse::application::club::CreateClub;
use clubhouse::application::collective::{AddPlayerToCollective, CreateCollective};
use clubhouse::application::player::RegisterPlayer;
use clubhouse::application::training_session::{
    ChangePlayerTrainingSessionStatus, CreateTrainingSession,
};
use clubhouse::application::{club, collective, player, training_session, user};
use clubhouse::auth::AllowAll;
use clubhouse::command::{CommandBus, Envelope, EventBus, Retry};
use clubhouse::domain::collective::PlayerAddedToCollective;
use clubhouse::domain::{
    AttendanceStatus, ClubRepository, CollectiveEvent, CollectiveRepository, DomainEvent,
    EventSerde, FederationRepository, Gender, LicenseType, PlayerRepository,
    TrainingSessionRepository, UserRepository, FEDERATION_ID,
};
use clubhouse::event::store::{Appender, Follower, InMemory, Store, Streamer};
use clubhouse::event::{self, Journal, StreamId, VersionSelect};
use clubhouse::fault::Fault;
use clubhouse::message::Message as _;
use clubhouse::notify::ClubChannels;
use clubhouse::projection::{Options, Worker};
use clubhouse::query::{ClubReads, PublicReads};
use clubhouse::version::Check;

fn command_bus<S>(store: &S) -> CommandBus
where
    S: Store<StreamId, DomainEvent> + Clone + 'static,
{
    let event_bus = Arc::new(EventBus::new());
    let mut bus = CommandBus::new(Arc::new(AllowAll), Retry::default());

    let club_service = club::Service::from(ClubRepository::from(store.clone()));
    bus.register::<CreateClub, _>(club_service.clone());
    bus.register::<club::ChangeClubOwner, _>(club_service.clone());
    bus.register::<club::AddCoach, _>(club_service);

    bus.register::<user::SignUpUser, _>(user::Service::from(UserRepository::from(store.clone())));

    bus.register::<RegisterPlayer, _>(player::Service::new(
        PlayerRepository::from(store.clone()),
        ClubRepository::from(store.clone()),
        FederationRepository::from(store.clone()),
        event_bus,
    ));

    let collective_service = collective::Service::new(
        CollectiveRepository::from(store.clone()),
        ClubRepository::from(store.clone()),
    );
    bus.register::<CreateCollective, _>(collective_service.clone());
    bus.register::<AddPlayerToCollective, _>(collective_service.clone());
    bus.register::<collective::RemovePlayerFromCollective, _>(collective_service);

    let training_service = training_session::Service::new(
        TrainingSessionRepository::from(store.clone()),
        PlayerRepository::from(store.clone()),
    );
    bus.register::<CreateTrainingSession, _>(training_service.clone());
    bus.register::<training_session::CancelTrainingSession, _>(training_service.clone());
    bus.register::<ChangePlayerTrainingSessionStatus, _>(training_service);

    bus
}

async fn read_model() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory read model should open")
}

async fn stream_events<S>(store: &S, stream_id: &str) -> Vec<event::Persisted<StreamId, DomainEvent>>
where
    S: Store<StreamId, DomainEvent>,
{
    store
        .stream(&stream_id.to_owned(), VersionSelect::All)
        .try_collect()
        .await
        .expect("streaming events should not fail")
}

// Finds the id generated for the single aggregate of the given kind.
async fn find_generated_id<S>(store: &S, prefix: &str) -> String
where
    S: Store<StreamId, DomainEvent>,
{
    let events = store
        .read_from(0, usize::MAX)
        .await
        .expect("reading the event log should not fail");

    events
        .iter()
        .map(|evt| &evt.stream_id)
        .find(|stream_id| stream_id.starts_with(prefix))
        .unwrap_or_else(|| panic!("no stream with prefix {prefix}"))
        .strip_prefix(prefix)
        .expect("prefix was just checked")
        .to_owned()
}

fn create_club(name: &str) -> Envelope<CreateClub> {
    Envelope::new(
        "u1",
        CreateClub {
            name: name.to_owned(),
            owner_id: "u1".to_owned(),
            registration_number: None,
        },
    )
}

fn register_player(club_id: &str, license_number: Option<&str>) -> Envelope<RegisterPlayer> {
    Envelope::new(
        "u1",
        RegisterPlayer {
            club_id: club_id.to_owned(),
            first_name: "A".to_owned(),
            last_name: "B".to_owned(),
            gender: Gender::M,
            date_of_birth: NaiveDate::from_ymd_opt(2010, 5, 1).unwrap(),
            season: "2025/2026".to_owned(),
            license_number: license_number.map(str::to_owned),
            license_type: Some(LicenseType::A),
        },
    )
}

#[tokio::test]
async fn creating_a_club_projects_a_row_and_emits_no_notification() {
    let store = InMemory::<StreamId, DomainEvent>::default();
    let bus = command_bus(&store);
    let pool = read_model().await;
    let channels = ClubChannels::new();

    bus.send(create_club("Alpha")).await.expect("create club");

    let club_id = find_generated_id(&store, "club-").await;

    let events = stream_events(&store, &format!("club-{club_id}")).await;
    assert_eq!(1, events.len());
    assert_eq!(0, events[0].version);
    assert_eq!("ClubCreated", events[0].event.message.name());

    let (sender, mut queue) = mpsc::unbounded_channel();
    channels.register(club_id.clone(), sender);

    let mut worker = Worker::new(store, pool.clone(), channels, Options::default());
    worker.prepare().await.expect("prepare worker");
    worker.catch_up().await.expect("catch up");

    let club = PublicReads::new(pool)
        .club(&club_id)
        .await
        .expect("club query")
        .expect("club row should exist");

    assert_eq!("Alpha", club.name);
    assert_eq!(0, club.number_of_players);

    assert!(queue.try_recv().is_err(), "creation emits no notification");
}

#[tokio::test]
async fn registering_a_player_updates_the_read_model_and_notifies_the_club() {
    let store = InMemory::<StreamId, DomainEvent>::default();
    let bus = command_bus(&store);
    let pool = read_model().await;
    let channels = ClubChannels::new();

    bus.send(create_club("Alpha")).await.expect("create club");
    let club_id = find_generated_id(&store, "club-").await;

    let mut worker = Worker::new(store.clone(), pool.clone(), channels.clone(), Options::default());
    worker.prepare().await.expect("prepare worker");
    worker.catch_up().await.expect("catch up");

    let (sender, mut queue) = mpsc::unbounded_channel();
    channels.register(club_id.clone(), sender);

    bus.send(register_player(&club_id, Some("L1")))
        .await
        .expect("register player");

    let federation_events = stream_events(&store, FEDERATION_ID).await;
    let federation_names: Vec<_> = federation_events
        .iter()
        .map(|evt| evt.event.message.name())
        .collect();
    assert_eq!(
        vec!["FederationInstituted", "PlayerLicenseRegistered"],
        federation_names,
    );

    let player_id = find_generated_id(&store, "player-").await;
    let player_events = stream_events(&store, &format!("player-{player_id}")).await;
    let player_names: Vec<_> = player_events
        .iter()
        .map(|evt| (evt.version, evt.event.message.name()))
        .collect();
    assert_eq!(
        vec![(0, "PlayerRegistered"), (1, "PlayerRegisteredToClub")],
        player_names,
    );

    worker.catch_up().await.expect("catch up");

    let player = PublicReads::new(pool.clone())
        .player_card(&player_id)
        .await
        .expect("player query")
        .expect("player row should exist");
    assert_eq!(Some(club_id.clone()), player.club_id);
    assert_eq!(Some("L1".to_owned()), player.license_number);

    let club = PublicReads::new(pool)
        .club(&club_id)
        .await
        .expect("club query")
        .expect("club row should exist");
    assert_eq!(1, club.number_of_players);

    assert_eq!(
        r#"{"type":"club_player_list_updated"}"#,
        queue.try_recv().expect("the club should have been notified"),
    );
}

#[tokio::test]
async fn a_duplicate_license_is_rejected_without_any_side_effect() {
    let store = InMemory::<StreamId, DomainEvent>::default();
    let bus = command_bus(&store);
    let pool = read_model().await;

    bus.send(create_club("Alpha")).await.expect("create club");
    let club_id = find_generated_id(&store, "club-").await;

    bus.send(register_player(&club_id, Some("L1")))
        .await
        .expect("register first player");

    let positions_before = store.last_position().await.expect("last position");

    let result = bus.send(register_player(&club_id, Some("L1"))).await;
    assert!(
        matches!(result, Err(Fault::InvalidOperation(_))),
        "a second player with the same license must be refused",
    );

    let positions_after = store.last_position().await.expect("last position");
    assert_eq!(
        positions_before, positions_after,
        "the rejected command must append nothing",
    );

    let mut worker = Worker::new(store, pool.clone(), ClubChannels::new(), Options::default());
    worker.prepare().await.expect("prepare worker");
    worker.catch_up().await.expect("catch up");

    let club = PublicReads::new(pool)
        .club(&club_id)
        .await
        .expect("club query")
        .expect("club row should exist");
    assert_eq!(1, club.number_of_players);
}

#[tokio::test]
async fn concurrent_collective_mutations_append_exactly_one_event() {
    let store = InMemory::<StreamId, DomainEvent>::default();
    let bus = command_bus(&store);

    bus.send(create_club("Alpha")).await.expect("create club");
    let club_id = find_generated_id(&store, "club-").await;

    bus.send(Envelope::new(
        "u1",
        CreateCollective {
            club_id: club_id.clone(),
            name: "U15".to_owned(),
            description: None,
        },
    ))
    .await
    .expect("create collective");

    let collective_id = find_generated_id(&store, "collective-").await;
    let stream_id = format!("collective-{collective_id}");

    let added = |player_id: &str| {
        event::Envelope::new(
            "u1",
            DomainEvent::Collective(CollectiveEvent::PlayerAdded(PlayerAddedToCollective {
                collective_id: collective_id.clone(),
                player_id: player_id.to_owned(),
            })),
        )
    };

    // Two writers race on the same expected version.
    let (first, second) = tokio::join!(
        store.append(stream_id.clone(), Check::MustBe(0), vec![added("p1")]),
        store.append(stream_id.clone(), Check::MustBe(0), vec![added("p1")]),
    );

    assert!(
        first.is_ok() != second.is_ok(),
        "exactly one concurrent append must win",
    );

    // The loser retries through the bus: the reload observes the new
    // member, and the command is refused as invalid.
    let result = bus
        .send(Envelope::new(
            "u1",
            AddPlayerToCollective {
                collective_id: collective_id.clone(),
                player_id: "p1".to_owned(),
            },
        ))
        .await;

    assert!(matches!(result, Err(Fault::InvalidOperation(_))));

    let added_events = stream_events(&store, &stream_id)
        .await
        .into_iter()
        .filter(|evt| evt.event.message.name() == "PlayerAddedToCollective")
        .count();
    assert_eq!(1, added_events);
}

#[tokio::test]
async fn training_session_status_transitions_follow_the_arrival_window() {
    let store = InMemory::<StreamId, DomainEvent>::default();
    let bus = command_bus(&store);
    let pool = read_model().await;

    bus.send(create_club("Alpha")).await.expect("create club");
    let club_id = find_generated_id(&store, "club-").await;

    bus.send(register_player(&club_id, None))
        .await
        .expect("register player");
    let player_id = find_generated_id(&store, "player-").await;

    bus.send(Envelope::new(
        "u1",
        CreateTrainingSession {
            club_id: club_id.clone(),
            start_time: Utc.with_ymd_and_hms(2025, 9, 1, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap(),
        },
    ))
    .await
    .expect("create training session");
    let training_session_id = find_generated_id(&store, "training_session-").await;

    let change_status = |status: AttendanceStatus, arrival_time| {
        Envelope::new(
            "u1",
            ChangePlayerTrainingSessionStatus {
                club_id: club_id.clone(),
                training_session_id: training_session_id.clone(),
                player_id: player_id.clone(),
                status,
                reason: None,
                arrival_time,
                with_reason: false,
            },
        )
    };

    bus.send(change_status(AttendanceStatus::Present, None))
        .await
        .expect("marking the player present should succeed");

    let positions_before = store.last_position().await.expect("last position");

    let result = bus
        .send(change_status(
            AttendanceStatus::Late,
            Some(Utc.with_ymd_and_hms(2025, 9, 1, 9, 30, 0).unwrap()),
        ))
        .await;
    assert!(
        matches!(result, Err(Fault::InvalidOperation(_))),
        "an arrival before the session starts must be refused",
    );
    assert_eq!(
        positions_before,
        store.last_position().await.expect("last position"),
    );

    bus.send(change_status(AttendanceStatus::Absent, None))
        .await
        .expect("marking the player absent should succeed");

    let mut worker = Worker::new(store, pool.clone(), ClubChannels::new(), Options::default());
    worker.prepare().await.expect("prepare worker");
    worker.catch_up().await.expect("catch up");

    let details = ClubReads::new(pool, club_id)
        .training_session(&training_session_id)
        .await
        .expect("training session query")
        .expect("training session row should exist");

    assert_eq!(0, details.session.number_of_players_present);
    assert_eq!(1, details.session.number_of_players_absent);
    assert_eq!(0, details.session.number_of_players_late);

    assert_eq!(1, details.attendance.len());
    assert_eq!(player_id, details.attendance[0].player_id);
    assert_eq!("ABSENT", details.attendance[0].status);
}

#[tokio::test]
async fn projection_replay_is_deterministic_across_batch_boundaries() {
    let store = InMemory::<StreamId, DomainEvent>::default();
    let bus = command_bus(&store);

    bus.send(create_club("Alpha")).await.expect("create club");
    let club_id = find_generated_id(&store, "club-").await;

    for _ in 0..3 {
        bus.send(register_player(&club_id, None))
            .await
            .expect("register player");
    }

    let one_by_one = read_model().await;
    let mut worker = Worker::new(
        store.clone(),
        one_by_one.clone(),
        ClubChannels::new(),
        Options {
            batch_size: 1,
            ..Options::default()
        },
    );
    worker.prepare().await.expect("prepare worker");
    worker.catch_up().await.expect("catch up");

    let batched = read_model().await;
    let mut worker = Worker::new(
        store,
        batched.clone(),
        ClubChannels::new(),
        Options::default(),
    );
    worker.prepare().await.expect("prepare worker");
    worker.catch_up().await.expect("catch up");

    let small = PublicReads::new(one_by_one);
    let large = PublicReads::new(batched);

    assert_eq!(
        small.clubs().await.expect("clubs query"),
        large.clubs().await.expect("clubs query"),
    );
    assert_eq!(
        3,
        small
            .club(&club_id)
            .await
            .expect("club query")
            .expect("club row")
            .number_of_players,
    );
}

#[tokio::test]
async fn a_journal_backed_deployment_survives_a_restart() {
    let journal_path = std::env::temp_dir().join(format!(
        "clubhouse-e2e-{}.json",
        uuid::Uuid::new_v4()
    ));
    let pool = read_model().await;

    let club_id = {
        let store =
            Journal::open(&journal_path, EventSerde).expect("journal should open");
        let bus = command_bus(&store);

        bus.send(create_club("Alpha")).await.expect("create club");
        let club_id = find_generated_id(&store, "club-").await;

        bus.send(register_player(&club_id, Some("L1")))
            .await
            .expect("register player");

        let mut worker = Worker::new(
            store,
            pool.clone(),
            ClubChannels::new(),
            Options::default(),
        );
        worker.prepare().await.expect("prepare worker");
        worker.catch_up().await.expect("catch up");

        club_id
    };

    // Restart: a new journal instance replays the file, the worker resumes
    // from the persisted cursor and finds nothing new to project.
    let store = Journal::open(&journal_path, EventSerde).expect("journal should reopen");
    let bus = command_bus(&store);

    let mut worker = Worker::new(
        store.clone(),
        pool.clone(),
        ClubChannels::new(),
        Options::default(),
    );
    worker.prepare().await.expect("prepare worker");
    assert_eq!(0, worker.catch_up().await.expect("catch up"));

    // The license registry survived the restart too.
    let result = bus.send(register_player(&club_id, Some("L1"))).await;
    assert!(matches!(result, Err(Fault::InvalidOperation(_))));

    let club = PublicReads::new(pool)
        .club(&club_id)
        .await
        .expect("club query")
        .expect("club row should exist");
    assert_eq!(1, club.number_of_players);

    std::fs::remove_file(&journal_path).ok();
}

#[tokio::test]
async fn the_read_facades_serve_paginated_and_filtered_views() {
    let store = InMemory::<StreamId, DomainEvent>::default();
    let bus = command_bus(&store);
    let pool = read_model().await;

    bus.send(create_club("Alpha")).await.expect("create club");
    let club_id = find_generated_id(&store, "club-").await;

    bus.send(Envelope::new(
        "u1",
        club::AddCoach {
            club_id: club_id.clone(),
            user_id: "coach-1".to_owned(),
        },
    ))
    .await
    .expect("add coach");

    for (first_name, last_name, license) in [
        ("Ada", "Adams", Some("L-100")),
        ("Bea", "Baker", Some("L-200")),
        ("Cal", "Carter", None),
    ] {
        let mut command = register_player(&club_id, license);
        command.message.first_name = first_name.to_owned();
        command.message.last_name = last_name.to_owned();
        bus.send(command).await.expect("register player");
    }

    bus.send(Envelope::new(
        "u1",
        CreateCollective {
            club_id: club_id.clone(),
            name: "U15".to_owned(),
            description: None,
        },
    ))
    .await
    .expect("create collective");
    let collective_id = find_generated_id(&store, "collective-").await;

    let mut worker = Worker::new(
        store.clone(),
        pool.clone(),
        ClubChannels::new(),
        Options::default(),
    );
    worker.prepare().await.expect("prepare worker");
    worker.catch_up().await.expect("catch up");

    let reads = ClubReads::new(pool.clone(), club_id.clone());

    let first_page = reads.players(0, 2).await.expect("players page");
    assert_eq!(3, first_page.total_count);
    assert_eq!(2, first_page.total_pages);
    assert_eq!(2, first_page.count);
    assert_eq!(0, first_page.page);
    assert_eq!(
        vec!["Adams", "Baker"],
        first_page
            .results
            .iter()
            .map(|player| player.last_name.as_str())
            .collect::<Vec<_>>(),
    );

    let second_page = reads.players(1, 2).await.expect("players page");
    assert_eq!(1, second_page.count);
    assert_eq!("Carter", second_page.results[0].last_name);

    // Case-insensitive substring search over names and license numbers.
    let by_name = reads.search_players("BAK", 0, 10).await.expect("search");
    assert_eq!(1, by_name.total_count);
    assert_eq!("Baker", by_name.results[0].last_name);

    let by_license = reads.search_players("l-1", 0, 10).await.expect("search");
    assert_eq!(1, by_license.total_count);
    assert_eq!("Adams", by_license.results[0].last_name);

    // Put Baker in the collective and re-project.
    let baker_id = by_name.results[0].id.clone();
    bus.send(Envelope::new(
        "u1",
        AddPlayerToCollective {
            collective_id: collective_id.clone(),
            player_id: baker_id.clone(),
        },
    ))
    .await
    .expect("add player to collective");

    worker.catch_up().await.expect("catch up");

    let members = reads
        .collective_players(&collective_id)
        .await
        .expect("collective players");
    assert_eq!(1, members.len());
    assert_eq!(baker_id, members[0].id);

    let outsiders = reads
        .players_not_in_collective(&collective_id, 0, 10)
        .await
        .expect("players not in collective");
    assert_eq!(2, outsiders.total_count);
    assert!(outsiders.results.iter().all(|player| player.id != baker_id));

    let collectives = reads.collectives().await.expect("collectives");
    assert_eq!(1, collectives.len());
    assert_eq!(1, collectives[0].number_of_players);

    // The coach sees the club among their clubs, the owner does too.
    let public = PublicReads::new(pool);
    let coach_clubs = public.user_clubs("coach-1").await.expect("user clubs");
    assert_eq!(1, coach_clubs.len());
    assert_eq!(club_id, coach_clubs[0].id);

    let owner_clubs = public.user_clubs("u1").await.expect("user clubs");
    assert_eq!(1, owner_clubs.len());

    let stranger_clubs = public.user_clubs("someone-else").await.expect("user clubs");
    assert!(stranger_clubs.is_empty());
}
