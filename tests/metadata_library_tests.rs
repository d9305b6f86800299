//! Integration tests for the local metadata library fixtures.

use std::path::Path;

use episode_rename::metadata::{LocalLibrary, MetadataCache, MetadataProvider};

fn load_fixture(name: &str) -> LocalLibrary {
    LocalLibrary::load(&Path::new("tests/fixtures").join(name)).expect("Failed to load library fixture")
}

#[test]
fn toml_library_loads() {
    let library = load_fixture("library.toml");
    assert_eq!(library.show_count(), 2);
    assert_eq!(library.movie_count(), 2);
}

#[test]
fn json_library_loads() {
    let library = load_fixture("library.json");
    assert_eq!(library.show_count(), 1);
    assert_eq!(library.movie_count(), 1);
}

#[test]
fn season_lookup_by_name_and_alias() {
    let library = load_fixture("library.toml");

    let season = library.season("the.office", 1).expect("should find season by dotted name");
    assert_eq!(season.name, "The Office");
    assert_eq!(season.season_number, Some(1));
    assert_eq!(season.entries.len(), 6);
    assert_eq!(season.entries[1], (2, "Diversity Day".to_string()));

    let alias = library.season("Office", 2).expect("should find season by alias");
    assert_eq!(alias.name, "The Office");
    assert_eq!(alias.entries.len(), 2);

    assert!(library.season("The Office", 9).is_none());
    assert!(library.season("Unknown Show", 1).is_none());
}

#[test]
fn movie_lookup_matches_year() {
    let library = load_fixture("library.toml");

    let movie = library.movie("The Matrix", Some(1999)).expect("should find movie");
    assert_eq!(movie.name, "The Matrix (1999)");
    assert_eq!(movie.genre.as_deref(), Some("Science Fiction"));

    assert!(library.movie("heat", None).is_some());
    assert!(library.movie("Heat", Some(2020)).is_none());
}

#[test]
fn cache_over_library_builds_destination_map() {
    let mut cache = MetadataCache::new(load_fixture("library.json"));
    let season = cache.lookup_season("Twin Peaks", 1).expect("should find season");
    let destination = season.destination_map();
    assert_eq!(destination.len(), 2);
    assert_eq!(destination.get(2).map(|episode| episode.name.as_str()), Some("Traces to Nowhere"));
    assert_eq!(cache.len(), 1);
}

#[test]
fn missing_library_is_an_error() {
    assert!(LocalLibrary::load(Path::new("tests/fixtures/does_not_exist.toml")).is_err());
}
