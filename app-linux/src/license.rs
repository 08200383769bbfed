//! License window. The client emphasises plan names with bold escapes;
//! those runs are kept as Pango bold.

use adgui_core::ansi;
use gtk::glib;
use gtk::prelude::*;

pub fn markup(text: &str) -> String {
    ansi::segments(text.trim_end())
        .iter()
        .map(|segment| {
            let escaped = glib::markup_escape_text(&segment.text);
            if segment.bold {
                format!("<b>{escaped}</b>")
            } else {
                escaped.to_string()
            }
        })
        .collect()
}

pub fn show(text: &str) {
    let dialog = gtk::MessageDialog::new(
        None::<&gtk::Window>,
        gtk::DialogFlags::empty(),
        gtk::MessageType::Info,
        gtk::ButtonsType::Close,
        "",
    );
    dialog.set_title("AdGuard VPN license");
    dialog.set_markup(&markup(text));
    dialog.connect_response(|dialog, _| dialog.close());
    dialog.show_all();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_runs_become_markup() {
        let text = "Plan: \x1b[1mFREE\x1b[0m\nDevices: 1\n";
        assert_eq!(markup(text), "Plan: <b>FREE</b>\nDevices: 1");
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(markup("a < b & [1mc[0m"), "a &lt; b &amp; <b>c</b>");
    }
}
