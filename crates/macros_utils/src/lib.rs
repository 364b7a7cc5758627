//! Small macros shared by the opsmon HTTP apps.

#[cfg(feature = "actix")]
#[doc(hidden)]
pub mod __private {
    pub use actix_web::web::ServiceConfig;
}

/// Generate a `pub fn routes(cfg: &mut ServiceConfig)` for the calling module.
///
/// `route <handler>` registers an actix service declared with one of the
/// routing attributes (`#[get(..)]`, ...). `mount <module>` delegates to the
/// `routes` function of a child module.
///
/// ```ignore
/// macros_utils::routes! {
///     route health_route,
///     mount monitoring,
/// }
/// ```
#[cfg(feature = "actix")]
#[macro_export]
macro_rules! routes {
    ($($kind:ident $name:ident),* $(,)?) => {
        pub fn routes(cfg: &mut $crate::__private::ServiceConfig) {
            $( $crate::__route_item!(cfg, $kind $name); )*
        }
    };
}

#[cfg(feature = "actix")]
#[doc(hidden)]
#[macro_export]
macro_rules! __route_item {
    ($cfg:ident, route $handler:ident) => {
        $cfg.service($handler);
    };
    ($cfg:ident, mount $module:ident) => {
        $cfg.configure($module::routes);
    };
}
