use indicatif::{ProgressBar, ProgressStyle};

pub fn default_style() -> ProgressStyle {
    match ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.green/black} {pos}/{len} {wide_msg}")
    {
        Ok(style) => style.progress_chars("=>-"),
        Err(_) => ProgressStyle::default_bar(),
    }
}

/// Bar for a routing run; the router sets the length once candidates are known.
pub fn run_bar(visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    bar.set_style(default_style());
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_bar_still_counts() {
        let bar = run_bar(false);
        bar.set_length(3);
        bar.inc(2);
        assert_eq!(bar.position(), 2);
        assert!(bar.is_hidden());
    }
}
