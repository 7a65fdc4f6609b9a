// src/routes.rs

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{
        admin, assignments, auth, lessons, progress, resources, schedules, students, topics,
    },
    state::AppState,
    utils::{
        csrf::{CSRF_HEADER, csrf_middleware},
        jwt::{admin_middleware, auth_middleware, student_middleware, teacher_middleware},
        rate_limit::rate_limit_middleware,
    },
};

/// Assembles the main application router.
///
/// * Public auth routes are rate limited but need neither a session nor CSRF.
/// * Every other route runs CSRF, rate limit, session and role checks, in that order.
/// * Global middleware: Trace, CORS.
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(CSRF_HEADER),
        ])
        .allow_credentials(true);

    let public_auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/student-login", post(auth::student_login))
        .route("/csrf", get(auth::csrf_token))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // Any signed-in user, teacher or student.
    let session_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/student-progress/increment", post(progress::record_solved));

    let student_routes = Router::new()
        .route("/me/progress", get(progress::my_progress))
        .layer(middleware::from_fn(student_middleware));

    let teacher_routes = Router::new()
        .route(
            "/lessons",
            get(lessons::list_lessons).post(lessons::create_lesson),
        )
        .route(
            "/lessons/{id}",
            get(lessons::get_lesson)
                .put(lessons::update_lesson)
                .delete(lessons::delete_lesson),
        )
        .route(
            "/lessons/{id}/topics",
            get(topics::list_topics).post(topics::create_topic),
        )
        .route("/lessons/{id}/topics/reorder", put(topics::reorder_topics))
        .route(
            "/topics/{id}",
            get(topics::get_topic)
                .put(topics::update_topic)
                .delete(topics::delete_topic),
        )
        .route("/topics/{id}/move", put(topics::move_topic))
        .route("/topics/{id}/resources", get(topics::topic_resources))
        .route(
            "/resources",
            get(resources::list_resources).post(resources::create_resource),
        )
        .route(
            "/resources/{id}",
            get(resources::get_resource)
                .put(resources::update_resource)
                .delete(resources::delete_resource),
        )
        .route(
            "/students",
            get(students::list_students).post(students::create_student),
        )
        .route(
            "/students/{id}",
            get(students::get_student)
                .put(students::update_student)
                .delete(students::delete_student),
        )
        .route(
            "/assignments",
            get(assignments::list_assignments).post(assignments::create_assignment),
        )
        .route(
            "/assignments/bulk-question-counts",
            post(assignments::bulk_question_counts),
        )
        .route(
            "/assignments/{id}",
            put(assignments::update_assignment).delete(assignments::delete_assignment),
        )
        .route(
            "/student-progress",
            get(progress::list_progress).put(progress::set_solved),
        )
        .route(
            "/schedules",
            get(schedules::list_schedules).post(schedules::create_schedule),
        )
        .route(
            "/schedules/{id}",
            get(schedules::get_schedule).delete(schedules::delete_schedule),
        )
        .route("/week-plans/{id}/topics", post(schedules::add_week_topic))
        .route(
            "/week-plans/{id}/reorder",
            put(schedules::reorder_week_topics),
        )
        .route(
            "/week-topics/{id}",
            put(schedules::update_week_topic).delete(schedules::delete_week_topic),
        )
        .route("/week-topics/{id}/move", put(schedules::move_week_topic))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            teacher_middleware,
        ));

    let admin_routes = Router::new()
        .route("/admin/teachers", get(admin::list_teachers))
        .route(
            "/admin/teachers/{id}/subscription",
            put(admin::update_subscription),
        )
        .layer(middleware::from_fn(admin_middleware));

    // Layers run bottom-up: CSRF first, then rate limit, then the session.
    let protected_routes = Router::new()
        .merge(session_routes)
        .merge(student_routes)
        .merge(teacher_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn(csrf_middleware));

    Router::new()
        .nest("/api/auth", public_auth_routes)
        .nest("/api", protected_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
