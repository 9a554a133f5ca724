//! Scroll tracking for the message list

/// Distance from the bottom, in pixels, that still counts as fully scrolled.
pub const SCROLL_TOLERANCE_PX: f64 = 1.0;

/// Geometry of the message list at the time of a scroll event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_height: f64,
    pub client_height: f64,
    pub scroll_top: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_height: f64, client_height: f64, scroll_top: f64) -> Self {
        Self {
            scroll_height,
            client_height,
            scroll_top,
        }
    }

    pub fn is_fully_scrolled(&self) -> bool {
        is_fully_scrolled(self.scroll_height, self.client_height, self.scroll_top)
    }
}

pub fn is_fully_scrolled(scroll_height: f64, client_height: f64, scroll_top: f64) -> bool {
    (scroll_height - client_height - scroll_top).abs() <= SCROLL_TOLERANCE_PX
}

/// The floating "scroll to bottom" button shows when a reply finished
/// while the user was reading further up.
pub fn show_new_message_indicator(fully_scrolled: bool, streaming_done: bool) -> bool {
    !fully_scrolled && streaming_done
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_one_pixel_counts_as_bottom() {
        assert!(is_fully_scrolled(1000.0, 400.0, 600.0));
        assert!(is_fully_scrolled(1000.0, 400.0, 599.0));
        assert!(is_fully_scrolled(1000.0, 400.0, 600.5));
        assert!(!is_fully_scrolled(1000.0, 400.0, 598.5));
        assert!(!is_fully_scrolled(1000.0, 400.0, 0.0));
    }

    #[test]
    fn test_indicator_truth_table() {
        assert!(show_new_message_indicator(false, true));
        assert!(!show_new_message_indicator(true, true));
        assert!(!show_new_message_indicator(false, false));
        assert!(!show_new_message_indicator(true, false));
    }

    #[test]
    fn test_metrics_delegate() {
        assert!(ScrollMetrics::new(500.0, 500.0, 0.0).is_fully_scrolled());
    }
}
