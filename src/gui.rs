//! GTK4 window showing the most recent slide.

use std::cell::RefCell;

use adw::prelude::*;
use gtk::gdk_pixbuf::{InterpType, Pixbuf};
use gtk::glib;
use gtk4 as gtk;
use libadwaita as adw;

use crate::config::WindowConfig;
use crate::display::{fit_within, SlideSink};
use crate::error::{Error, Result};
use crate::slides::SavedSlide;

const APP_ID: &str = "io.github.classroom_ppt.Viewer";

/// Forwards slides from the watcher thread to the GTK main loop.
pub struct ChannelSink {
    sender: glib::Sender<SavedSlide>,
}

impl SlideSink for ChannelSink {
    fn show(&mut self, slide: &SavedSlide) -> Result<()> {
        self.sender
            .send(slide.clone())
            .map_err(|_| Error::ViewerClosed)
    }
}

pub fn channel() -> (ChannelSink, glib::Receiver<SavedSlide>) {
    let (sender, receiver) = glib::MainContext::channel(glib::PRIORITY_DEFAULT);
    (ChannelSink { sender }, receiver)
}

/// Runs the viewer on the calling thread until the window is closed.
pub fn run(window: WindowConfig, receiver: glib::Receiver<SavedSlide>) {
    let app = adw::Application::builder().application_id(APP_ID).build();
    let receiver = RefCell::new(Some(receiver));

    app.connect_activate(move |app| {
        let title = adw::WindowTitle::new("Latest PPT Viewer", "Waiting for slides");
        let header = adw::HeaderBar::builder().title_widget(&title).build();
        let picture = gtk::Picture::builder()
            .can_shrink(true)
            .hexpand(true)
            .vexpand(true)
            .build();

        let content = gtk::Box::new(gtk::Orientation::Vertical, 0);
        content.append(&header);
        content.append(&picture);

        let main_window = adw::ApplicationWindow::builder()
            .application(app)
            .title("Latest PPT Viewer")
            .default_width(window.width)
            .default_height(window.height)
            .content(&content)
            .build();

        if let Some(receiver) = receiver.borrow_mut().take() {
            receiver.attach(None, move |slide| {
                match load_scaled(&slide, window) {
                    Ok(pixbuf) => {
                        picture.set_pixbuf(Some(&pixbuf));
                        let name = slide
                            .path
                            .file_name()
                            .map(|name| name.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        title.set_subtitle(&name);
                    }
                    Err(e) => {
                        tracing::warn!(path = %slide.path.display(), "Failed to load slide: {e}")
                    }
                }
                glib::Continue(true)
            });
        }

        main_window.present();
    });

    // GTK must not see our own command line arguments.
    app.run_with_args::<&str>(&[]);
}

fn load_scaled(slide: &SavedSlide, window: WindowConfig) -> std::result::Result<Pixbuf, glib::Error> {
    let pixbuf = Pixbuf::from_file(&slide.path)?;
    let (width, height) = fit_within(
        pixbuf.width().max(0) as u32,
        pixbuf.height().max(0) as u32,
        window.max_image_width,
        window.max_image_height,
    );
    if width == 0 || height == 0 {
        return Ok(pixbuf);
    }
    Ok(pixbuf
        .scale_simple(width as i32, height as i32, InterpType::Bilinear)
        .unwrap_or(pixbuf))
}
