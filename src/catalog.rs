//! Route catalog and terminal resolver.
//!
//! The set of supported routes is closed and initialised at start-up;
//! nothing here mutates after that. Terminal names are matched against
//! the exact WSDOT spelling, case-sensitively, after trimming.

/// Static attributes of a supported ferry route.
#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub route_id: i32,
    pub description: &'static str,
    pub west_name: &'static str,
    pub east_name: &'static str,
    /// Nominal crossing duration in minutes, used when the upstream
    /// doesn't predict an arrival.
    pub crossing_minutes: i64,
}

/// Resolved upstream terminal IDs for a route's two endpoints.
/// Either side may be `None` when the name isn't in the table; callers
/// degrade rather than fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminalIds {
    pub west: Option<i32>,
    pub east: Option<i32>,
}

const ROUTES: &[Route] = &[
    Route {
        route_id: 5,
        description: "Seattle / Bainbridge Island",
        west_name: "Bainbridge Island",
        east_name: "Seattle",
        crossing_minutes: 35,
    },
    Route {
        route_id: 3,
        description: "Seattle / Bremerton",
        west_name: "Bremerton",
        east_name: "Seattle",
        crossing_minutes: 60,
    },
    Route {
        route_id: 6,
        description: "Edmonds / Kingston",
        west_name: "Kingston",
        east_name: "Edmonds",
        crossing_minutes: 30,
    },
    Route {
        route_id: 7,
        description: "Mukilteo / Clinton",
        west_name: "Clinton",
        east_name: "Mukilteo",
        crossing_minutes: 20,
    },
    Route {
        route_id: 8,
        description: "Port Townsend / Coupeville",
        west_name: "Port Townsend",
        east_name: "Coupeville",
        crossing_minutes: 35,
    },
    Route {
        route_id: 11,
        description: "Point Defiance / Tahlequah",
        west_name: "Tahlequah",
        east_name: "Point Defiance",
        crossing_minutes: 15,
    },
];

/// WSDOT terminal name -> numeric terminal ID, exact upstream spelling.
const TERMINALS: &[(&str, i32)] = &[
    ("Anacortes", 1),
    ("Bainbridge Island", 3),
    ("Bremerton", 4),
    ("Clinton", 5),
    ("Coupeville", 11),
    ("Edmonds", 8),
    ("Fauntleroy", 9),
    ("Friday Harbor", 10),
    ("Kingston", 12),
    ("Lopez Island", 13),
    ("Mukilteo", 14),
    ("Orcas Island", 15),
    ("Point Defiance", 16),
    ("Port Townsend", 17),
    ("Seattle", 7),
    ("Shaw Island", 19),
    ("Southworth", 20),
    ("Tahlequah", 21),
    ("Vashon Island", 22),
];

/// Full ordered list of supported routes.
pub fn routes() -> &'static [Route] {
    ROUTES
}

/// Look up a route by ID. Absence means the route is unsupported and
/// callers treat it as a 404-equivalent.
pub fn get(route_id: i32) -> Option<&'static Route> {
    ROUTES.iter().find(|r| r.route_id == route_id)
}

/// Map a terminal name to its upstream numeric ID.
pub fn terminal_id(name: &str) -> Option<i32> {
    let trimmed = name.trim();
    TERMINALS
        .iter()
        .find(|(n, _)| *n == trimmed)
        .map(|(_, id)| *id)
}

/// Resolve both of a route's endpoints to upstream terminal IDs.
pub fn resolve(route: &Route) -> TerminalIds {
    TerminalIds {
        west: terminal_id(route.west_name),
        east: terminal_id(route.east_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_non_empty_and_ordered() {
        let all = routes();
        assert!(!all.is_empty());
        assert_eq!(all[0].route_id, 5);
    }

    #[test]
    fn get_known_route() {
        let route = get(5).unwrap();
        assert_eq!(route.description, "Seattle / Bainbridge Island");
        assert_eq!(route.crossing_minutes, 35);
    }

    #[test]
    fn get_unknown_route_is_none() {
        assert!(get(999).is_none());
    }

    #[test]
    fn every_route_resolves_both_terminals() {
        for route in routes() {
            assert_ne!(route.west_name, route.east_name, "{}", route.description);
            let ids = resolve(route);
            assert!(ids.west.is_some(), "west of {}", route.description);
            assert!(ids.east.is_some(), "east of {}", route.description);
            assert_ne!(ids.west, ids.east);
        }
    }

    #[test]
    fn seattle_bainbridge_ids() {
        let ids = resolve(get(5).unwrap());
        assert_eq!(ids.west, Some(3));
        assert_eq!(ids.east, Some(7));
    }

    #[test]
    fn terminal_lookup_trims_but_is_case_sensitive() {
        assert_eq!(terminal_id("  Seattle "), Some(7));
        assert_eq!(terminal_id("seattle"), None);
        assert_eq!(terminal_id("Elliott Bay"), None);
    }
}
