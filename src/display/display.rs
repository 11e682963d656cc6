//! SDL2 Window Display Module
//! Creates the booth window, uploads each tick's composed frame, and decodes
//! pending keyboard events into the one input the state machine consumes.

use color_eyre::{eyre::eyre, Result};
use image::RgbImage;
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};
use sdl2::EventPump;

use crate::booth::UserInput;

pub struct Sdl2Display {
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
    event_pump: EventPump,
}

impl Sdl2Display {
    pub fn new(sdl_context: &sdl2::Sdl, width: u32, height: u32) -> Result<Self> {
        let video_subsystem = sdl_context.video().map_err(|e| eyre!(e))?;

        let window = video_subsystem
            .window("Photo Clinic", width, height)
            .position_centered()
            .build()?;

        let canvas = window.into_canvas().present_vsync().build()?;
        let texture_creator = canvas.texture_creator();
        let event_pump = sdl_context.event_pump().map_err(|e| eyre!(e))?;

        Ok(Self {
            canvas,
            texture_creator,
            event_pump,
        })
    }

    /// Upload and present one composed frame, letting the canvas scale it to
    /// the window.
    pub fn show(&mut self, frame: &RgbImage) -> Result<()> {
        let (width, height) = frame.dimensions();

        let mut texture = self
            .texture_creator
            .create_texture_streaming(PixelFormatEnum::RGB24, width, height)
            .map_err(|e| eyre!(e))?;

        texture
            .update(None, frame.as_raw(), (width * 3) as usize)
            .map_err(|e| eyre!(e))?;

        self.canvas.clear();
        self.canvas
            .copy(&texture, None, None)
            .map_err(|e| eyre!(e))?;
        self.canvas.present();
        Ok(())
    }

    /// Drain pending events into the single input for this tick.
    pub fn poll_input(&mut self) -> UserInput {
        resolve_input(self.event_pump.poll_iter().map(map_event))
    }
}

fn map_event(event: Event) -> UserInput {
    match event {
        Event::Quit { .. } => UserInput::Quit,
        Event::KeyDown {
            keycode: Some(key), ..
        } => match key {
            Keycode::Escape => UserInput::Quit,
            Keycode::Return | Keycode::KpEnter => UserInput::Accept,
            Keycode::R => UserInput::Retry,
            Keycode::Space => UserInput::TriggerCapture,
            _ => UserInput::None,
        },
        _ => UserInput::None,
    }
}

/// Collapse everything pressed during one tick into one input:
/// Quit > Accept/Retry > TriggerCapture, later presses winning ties.
fn resolve_input<I: IntoIterator<Item = UserInput>>(events: I) -> UserInput {
    let mut resolved = UserInput::None;
    for input in events {
        if input != UserInput::None && priority(input) >= priority(resolved) {
            resolved = input;
        }
    }
    resolved
}

fn priority(input: UserInput) -> u8 {
    match input {
        UserInput::Quit => 3,
        UserInput::Accept | UserInput::Retry => 2,
        UserInput::TriggerCapture => 1,
        UserInput::None => 0,
    }
}
