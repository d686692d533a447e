pub const LOGIN_ROUTE: &str = "/auth/login";
pub const REFRESH_ROUTE: &str = "/auth/refresh";

/// Routes that never carry a bearer token.
pub const PUBLIC_ROUTES: [&str; 6] = [
    LOGIN_ROUTE,
    REFRESH_ROUTE,
    "/users",
    "/drivers",
    "/package-tours",
    "/tourist-points",
];

/// Exact match on the path; the query string is not part of it.
pub fn is_public_route(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    PUBLIC_ROUTES.contains(&path)
}
