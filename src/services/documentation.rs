use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the party game backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::room_info,
        crate::routes::sse::host_stream,
        crate::routes::sse::player_stream,
        crate::routes::games::start_game,
        crate::routes::games::reaction,
        crate::routes::games::list_categories,
        crate::routes::teams::random_teams,
        crate::routes::teams::select_team,
        crate::routes::teams::reset_teams,
        crate::routes::teams::team_status,
    ),
    components(schemas(
        crate::dto::room::CreateRoomResponse,
        crate::dto::room::JoinRoomRequest,
        crate::dto::room::JoinRoomResponse,
        crate::dto::room::RoomView,
        crate::dto::room::PlayerView,
        crate::dto::room::StartGameRequest,
        crate::dto::room::ReactionRequest,
        crate::dto::team::RandomTeamsRequest,
        crate::dto::team::SelectTeamRequest,
        crate::dto::team::ResetTeamsRequest,
        crate::dto::team::TeamStatusView,
    )),
    tags(
        (name = "health", description = "Health check"),
        (name = "rooms", description = "Room lifecycle and presence"),
        (name = "sse", description = "Host and player event streams"),
        (name = "teams", description = "Team assignment"),
        (name = "games", description = "Game selection and per-game commands"),
    )
)]
pub struct ApiDoc;
