//! Download queue construction.

use tracing::{debug, info};

use crate::track::Track;

/// Build the ordered download queue: every playlist track whose id tag
/// does not appear in any already-downloaded file name.
///
/// Playlist order is preserved; matching is a plain substring check on
/// the `[<id>]` tag, nothing fuzzier. An empty playlist yields an empty
/// queue.
#[must_use]
pub fn build_queue(tracks: &[Track], downloaded: &[String]) -> Vec<Track> {
    info!("Building the download queue");

    let mut queue = Vec::new();
    for track in tracks {
        let tag = track.id_tag();
        if downloaded.iter().any(|name| name.contains(&tag)) {
            debug!("Already downloaded: {}", track.title);
        } else {
            debug!("Queued: {}", track.title);
            queue.push(track.clone());
        }
    }

    info!("Total new songs to download: {}", queue.len());
    queue
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, title: &str) -> Track {
        Track::new(id, title)
    }

    #[test]
    fn test_queue_is_set_difference_preserving_order() {
        let tracks = vec![track("a1", "A"), track("b2", "B"), track("c3", "C")];
        let downloaded = vec!["B [b2].mp3".to_string()];

        let queue = build_queue(&tracks, &downloaded);
        assert_eq!(queue, vec![track("a1", "A"), track("c3", "C")]);
    }

    #[test]
    fn test_empty_playlist_yields_empty_queue() {
        let queue = build_queue(&[], &["X [x].mp3".to_string()]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_library_yields_empty_queue() {
        let tracks = vec![track("a1", "A"), track("b2", "B")];
        let downloaded = vec!["A [a1].mp3".to_string(), "B [b2].mp3".to_string()];

        assert!(build_queue(&tracks, &downloaded).is_empty());
    }

    #[test]
    fn test_match_is_by_id_not_title() {
        // Same title on disk but a different id still queues the track.
        let tracks = vec![track("new9", "Song")];
        let downloaded = vec!["Song [old1].mp3".to_string()];

        let queue = build_queue(&tracks, &downloaded);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_renamed_file_still_matches_by_tag() {
        let tracks = vec![track("a1", "A")];
        let downloaded = vec!["renamed title [a1].mp3".to_string()];

        assert!(build_queue(&tracks, &downloaded).is_empty());
    }
}
