//! Media types and `Accept` negotiation.

/// Media types produced or consumed by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// `application/json`
    Json,
    /// `application/x-pem-file`
    Pem,
}

impl MediaType {
    /// The MIME string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Pem => "application/x-pem-file",
        }
    }

    fn parts(self) -> (&'static str, &'static str) {
        match self {
            Self::Json => ("application", "json"),
            Self::Pem => ("application", "x-pem-file"),
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct MediaRange<'a> {
    kind: &'a str,
    subtype: &'a str,
    quality: f32,
}

impl MediaRange<'_> {
    /// Specificity of the match against `media`, or `None` if it does not match.
    fn matches(&self, media: MediaType) -> Option<u8> {
        let (kind, subtype) = media.parts();
        match (self.kind, self.subtype) {
            ("*", "*") => Some(0),
            (k, "*") if k.eq_ignore_ascii_case(kind) => Some(1),
            (k, s) if k.eq_ignore_ascii_case(kind) && s.eq_ignore_ascii_case(subtype) => Some(2),
            _ => None,
        }
    }
}

fn parse_ranges(header: &str) -> Vec<MediaRange<'_>> {
    header
        .split(',')
        .filter_map(|item| {
            let mut params = item.split(';');
            let (kind, subtype) = params.next()?.trim().split_once('/')?;
            let quality = params
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            Some(MediaRange {
                kind: kind.trim(),
                subtype: subtype.trim(),
                quality,
            })
        })
        .collect()
}

/// Quality of the most specific range matching `media`. Among equally specific
/// ranges the first one in the header counts.
fn quality_of(ranges: &[MediaRange<'_>], media: MediaType) -> f32 {
    let mut best: Option<(u8, f32)> = None;
    for range in ranges {
        if let Some(specificity) = range.matches(media) {
            if best.map_or(true, |(s, _)| specificity > s) {
                best = Some((specificity, range.quality));
            }
        }
    }
    best.map_or(0.0, |(_, quality)| quality)
}

/// Chooses the response type for an `Accept` header.
///
/// No header means the first provided type. Otherwise each provided type takes
/// the quality of the most specific range matching it, and the highest non-zero
/// quality wins; ties go to the earlier provided type.
pub fn negotiate(accept: Option<&str>, provided: &[MediaType]) -> Option<MediaType> {
    let accept = match accept.map(str::trim) {
        None | Some("") => return provided.first().copied(),
        Some(header) => header,
    };
    let ranges = parse_ranges(accept);

    let mut best: Option<(MediaType, f32)> = None;
    for &media in provided {
        let quality = quality_of(&ranges, media);
        if quality > 0.0 && best.map_or(true, |(_, q)| quality > q) {
            best = Some((media, quality));
        }
    }
    best.map(|(media, _)| media)
}

/// Whether a request body of `content_type` can be consumed.
///
/// A missing header is read as JSON.
pub fn accepts(content_type: Option<&str>, accepted: &[MediaType]) -> bool {
    let Some(content_type) = content_type else {
        return accepted.contains(&MediaType::Json);
    };
    let essence = content_type.split(';').next().unwrap_or("").trim();
    accepted
        .iter()
        .any(|media| media.as_str().eq_ignore_ascii_case(essence))
}
