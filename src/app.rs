//! The pet application - connects the state machine to the window

use pet_ui::{
    Canvas, GenericEvent, GpuResources, PetApp, SheetData, SpriteSheet, WindowHost,
};

use crate::behavior::{BehaviorState, SheetLayout, StateMachine};

/// Keysym of the Escape key.
pub const KEY_ESCAPE: u32 = 0xff1b;

pub struct Pet {
    machine: StateMachine,
    sheet_data: SheetData,
    sheet: Option<SpriteSheet>,
    quit_requested: bool,
}

impl Pet {
    pub fn new(machine: StateMachine, sheet_data: SheetData, layout: SheetLayout) -> Self {
        let (need_width, need_height) = required_sheet_size(layout.frame_size);
        if sheet_data.width() < need_width || sheet_data.height() < need_height {
            log::warn!(
                "Sprite sheet is {}x{}, animations expect at least {}x{}",
                sheet_data.width(),
                sheet_data.height(),
                need_width,
                need_height
            );
        }

        Self {
            machine,
            sheet_data,
            sheet: None,
            quit_requested: false,
        }
    }

    #[cfg(test)]
    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }
}

/// Smallest sheet holding every animation strip.
fn required_sheet_size(frame_size: u32) -> (u32, u32) {
    BehaviorState::ALL.iter().fold((0, 0), |(w, h), state| {
        let animation = state.animation();
        (
            w.max(animation.frames * frame_size),
            h.max(animation.row + frame_size),
        )
    })
}

impl PetApp for Pet {
    fn init_gpu(&mut self, gpu: GpuResources<'_>) {
        self.sheet = Some(SpriteSheet::from_data(&self.sheet_data, gpu.device, gpu.queue));
    }

    fn update(&mut self, ticks: u64, host: &mut dyn WindowHost) {
        if let Some((x, y)) = self.machine.update(ticks) {
            host.set_position(x, y);
        }
    }

    fn on_event(&mut self, event: &GenericEvent) {
        match event {
            GenericEvent::MouseMotion { .. } => self.machine.on_pointer_motion(),
            GenericEvent::KeyDown {
                keysym: KEY_ESCAPE, ..
            } => {
                log::info!("Escape pressed, quitting");
                self.quit_requested = true;
            }
            GenericEvent::Quit => self.quit_requested = true,
            _ => {}
        }
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        if let Some(sheet) = &self.sheet {
            let frame = self.machine.frame();
            canvas.draw(sheet, frame.src, frame.dst, frame.flip_horizontal);
        }
    }

    fn should_quit(&self) -> bool {
        self.quit_requested
    }
}
