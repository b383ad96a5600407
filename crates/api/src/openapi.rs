use crate::models::*;
use crate::routes::health::HealthResponse;
use utoipa::OpenApi;

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tutor Relay API",
        description = "Streams tutoring hints for the in-game \"Ask for help\" button.\n\n## Stream format\n\nA successful call answers with `text/event-stream`. Each fragment arrives as `data: <text>\\n\\n`; newlines inside the text are sent as the two characters `\\n`. A failure after streaming started, or an empty answer, ends the stream with a single `error: <message>\\n\\n` frame.",
        version = "1.0.0",
        license(
            name = "MIT",
        )
    ),
    paths(
        crate::routes::inference::llm_inference_stream,
        crate::routes::health::health_check,
    ),
    components(
        schemas(
            InferenceRequestBody, Message, Role, ErrorResponse, HealthResponse,
        ),
    )
)]
pub struct ApiDoc;
