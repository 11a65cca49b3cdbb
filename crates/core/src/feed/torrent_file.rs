//! Magnet links from .torrent metainfo.

use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};

use super::FeedError;

/// Build a magnet link for a .torrent file. Returns `(magnet, hash)`.
///
/// The magnet carries the display name and every announce URL.
pub fn magnet_from_torrent(bytes: &[u8]) -> Result<(String, String), FeedError> {
    let torrent: TorrentMetaV1Owned =
        torrent_from_bytes(bytes).map_err(|e| FeedError::Torrent(e.to_string()))?;

    let hash = torrent.info_hash.as_string().to_lowercase();
    let mut magnet = format!("magnet:?xt=urn:btih:{}", hash);

    if let Some(name) = torrent.info.name.as_ref() {
        let name = String::from_utf8_lossy(name.as_ref());
        magnet.push_str(&format!("&dn={}", urlencoding::encode(&name)));
    }

    let mut trackers: Vec<String> = Vec::new();
    let announce = torrent.announce.iter();
    let tiers = torrent.announce_list.iter().flatten();
    for url in announce.chain(tiers) {
        let url = String::from_utf8_lossy(url.as_ref()).into_owned();
        if !url.is_empty() && !trackers.contains(&url) {
            trackers.push(url);
        }
    }
    for tracker in &trackers {
        magnet.push_str(&format!("&tr={}", urlencoding::encode(tracker)));
    }

    Ok((magnet, hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_torrent() {
        assert!(matches!(
            magnet_from_torrent(b"not a valid torrent"),
            Err(FeedError::Torrent(_))
        ));
        assert!(magnet_from_torrent(b"").is_err());
    }

    #[test]
    fn test_single_file_torrent() {
        let torrent: &[u8] = b"d8:announce23:http://tracker/announce4:infod6:lengthi4e4:name11:Show 01.mkv12:piece lengthi16384e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";
        let (magnet, hash) = magnet_from_torrent(torrent).unwrap();

        assert_eq!(hash.len(), 40);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(magnet.starts_with(&format!("magnet:?xt=urn:btih:{}", hash)));
        assert!(magnet.contains("&dn=Show%2001.mkv"));
        assert!(magnet.contains("&tr=http%3A%2F%2Ftracker%2Fannounce"));
    }
}
