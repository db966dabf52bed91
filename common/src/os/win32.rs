use std::{collections::VecDeque, ffi::c_void, ptr::NonNull};

use windows::{
    core::{s, PCSTR},
    Win32::{
        Foundation::{HWND, LPARAM, LRESULT, RECT, WPARAM},
        Graphics::Gdi::{GetStockObject, HBRUSH, NULL_BRUSH},
        System::LibraryLoader::GetModuleHandleA,
        UI::{
            Input::KeyboardAndMouse::VK_ESCAPE,
            WindowsAndMessaging::{
                AdjustWindowRect, CreateWindowExA, DefWindowProcA, DestroyWindow,
                DispatchMessageA, GetClientRect, GetSystemMetrics, GetWindowLongPtrA, IsWindow,
                LoadCursorA, LoadIconA, PeekMessageA, PostQuitMessage, RegisterClassExA,
                SetWindowLongPtrA, ShowWindow, TranslateMessage, CREATESTRUCTA, CS_HREDRAW,
                CS_VREDRAW, GWLP_USERDATA, IDC_ARROW, IDI_APPLICATION, MSG, PM_REMOVE,
                SM_CXSCREEN, SM_CYSCREEN, SW_SHOW, WM_CREATE, WM_DESTROY, WM_KEYDOWN, WM_KEYUP,
                WM_QUIT, WM_SIZE, WNDCLASSEXA, WS_OVERLAPPEDWINDOW,
            },
        },
    },
};

use crate::{
    config::{AppConfig, CommandLine},
    error::AppError,
    gfx::device::Direct3D,
    os::{centered_origin, split_lparam, FrameTimer, WindowEvent},
    trace_hr,
    util::AsCString,
};

/// State the window procedure writes into; owned by `Window`.
struct WindowState {
    events: VecDeque<WindowEvent>,
    exit_on_escape: bool,
}

pub struct Window {
    hwnd: HWND,
    state: NonNull<WindowState>,
}

impl Window {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let instance = unsafe { GetModuleHandleA(None) }?;

        let class_name = s!("DXAPPWNDCLASS");

        let wc = WNDCLASSEXA {
            cbSize: std::mem::size_of::<WNDCLASSEXA>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(wndproc),
            hInstance: instance.into(),
            hIcon: unsafe { LoadIconA(None, PCSTR(IDI_APPLICATION.0 as _)) }?,
            hCursor: unsafe { LoadCursorA(None, PCSTR(IDC_ARROW.0 as _)) }?,
            hbrBackground: HBRUSH(unsafe { GetStockObject(NULL_BRUSH) }.0),
            lpszClassName: class_name,
            hIconSm: unsafe { LoadIconA(None, PCSTR(IDI_APPLICATION.0 as _)) }?,
            ..Default::default()
        };

        if unsafe { RegisterClassExA(&wc) } == 0 {
            log::error!("FAILED TO CREATE WINDOW CLASS");
            return Err(AppError::WindowClass);
        }

        let mut window_rect = RECT {
            left: 0,
            top: 0,
            right: config.client_width as i32,
            bottom: config.client_height as i32,
        };
        unsafe { AdjustWindowRect(&mut window_rect, WS_OVERLAPPEDWINDOW, false) }?;
        let window_size = (
            window_rect.right - window_rect.left,
            window_rect.bottom - window_rect.top,
        );

        let screen_size = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        let (x, y) = centered_origin(screen_size, window_size);

        let state = NonNull::from(Box::leak(Box::new(WindowState {
            events: VecDeque::new(),
            exit_on_escape: config.exit_on_escape,
        })));

        let title = config.title.as_c_string();

        let hwnd = unsafe {
            CreateWindowExA(
                Default::default(),
                class_name,
                PCSTR(title.as_ptr() as _),
                WS_OVERLAPPEDWINDOW,
                x,
                y,
                window_size.0,
                window_size.1,
                None, // No parent window.
                None, // No menus.
                instance,
                Some(state.as_ptr() as *const c_void),
            )
        };

        let hwnd = match hwnd {
            Ok(hwnd) if !hwnd.is_invalid() => hwnd,
            result => {
                drop(unsafe { Box::from_raw(state.as_ptr()) });
                match result {
                    Err(e) => log::error!("FAILED TO CREATE WINDOW: {e}"),
                    Ok(_) => log::error!("FAILED TO CREATE WINDOW"),
                }
                return Err(AppError::WindowCreation);
            }
        };

        let _ = unsafe { ShowWindow(hwnd, SW_SHOW) };

        log::info!(
            "created window \"{}\" ({}x{} client area)",
            config.title,
            config.client_width,
            config.client_height
        );

        Ok(Self { hwnd, state })
    }

    pub fn get_handle(&self) -> HWND {
        self.hwnd
    }

    pub fn get_physical_size(&self) -> (u32, u32) {
        let mut client_rect = RECT::default();
        if let Err(e) = unsafe { GetClientRect(self.hwnd, &mut client_rect) } {
            log::warn!("failed to get client rect {e}");
        }

        (
            (client_rect.right - client_rect.left).max(0) as u32,
            (client_rect.bottom - client_rect.top).max(0) as u32,
        )
    }

    /// Next queued event. Only call between message dispatches.
    pub fn next_event(&mut self) -> Option<WindowEvent> {
        unsafe { self.state.as_mut() }.events.pop_front()
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        unsafe {
            if IsWindow(self.hwnd).as_bool() {
                SetWindowLongPtrA(self.hwnd, GWLP_USERDATA, 0);
                let _ = DestroyWindow(self.hwnd);
            }
            drop(Box::from_raw(self.state.as_ptr()));
        }
    }
}

/// The overridable part of an application: created once Direct3D is up,
/// then driven by the frame loop.
pub trait DxApp: Sized {
    fn init(gfx: &mut Direct3D, config: &AppConfig) -> Result<Self, AppError>;

    fn update(&mut self, gfx: &Direct3D, dt: f32);

    fn render(&mut self, gfx: &mut Direct3D, dt: f32) -> Result<(), AppError>;

    fn on_key_down(&mut self, _key: u8) {}

    fn on_key_up(&mut self, _key: u8) {}

    fn on_resize(&mut self, _gfx: &Direct3D, _width: u32, _height: u32) {}
}

/// Owns the window, the device and the user application.
///
/// Fields drop top to bottom: application resources first, the window last.
pub struct App<A: DxApp> {
    app: A,
    gfx: Direct3D,
    window: Window,
    timer: FrameTimer,
}

impl<A: DxApp> App<A> {
    pub fn init(config: &AppConfig, command_line: &CommandLine) -> Result<Self, AppError> {
        let window = Window::new(config)?;
        let mut gfx = Direct3D::new(window.get_handle(), window.get_physical_size(), config, command_line)?;
        let app = A::init(&mut gfx, config)?;

        Ok(Self {
            app,
            gfx,
            window,
            timer: FrameTimer::new(),
        })
    }

    /// Pumps messages until `WM_QUIT`, rendering whenever the queue is empty.
    /// Returns the quit message's exit code.
    pub fn run(&mut self) -> i32 {
        let mut message = MSG::default();

        loop {
            if unsafe { PeekMessageA(&mut message, None, 0, 0, PM_REMOVE) }.as_bool() {
                if message.message == WM_QUIT {
                    log::info!(
                        "quit after {} frames ({:.1}s)",
                        self.timer.frame_count(),
                        self.timer.total_seconds()
                    );
                    return message.wParam.0 as i32;
                }

                unsafe {
                    let _ = TranslateMessage(&message);
                    DispatchMessageA(&message);
                }
            } else {
                self.handle_window_events();

                let dt = self.timer.tick();
                self.app.update(&self.gfx, dt);
                let _ = trace_hr!(self.app.render(&mut self.gfx, dt));
            }
        }
    }

    fn handle_window_events(&mut self) {
        while let Some(event) = self.window.next_event() {
            match event {
                WindowEvent::KeyDown(key) => self.app.on_key_down(key),
                WindowEvent::KeyUp(key) => self.app.on_key_up(key),
                WindowEvent::Resized(width, height) => {
                    if let Some(true) = trace_hr!(self.gfx.resize(width, height)) {
                        self.app.on_resize(&self.gfx, width, height);
                    }
                }
            }
        }
    }
}

/// Creates the application and runs it to completion.
pub fn run<A: DxApp>(config: &AppConfig, command_line: &CommandLine) -> Result<i32, AppError> {
    let mut app = App::<A>::init(config, command_line)?;
    Ok(app.run())
}

fn window_wndproc(
    hwnd: HWND,
    state: &mut WindowState,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> bool {
    match message {
        WM_KEYDOWN => {
            let key = wparam.0 as u8;
            if state.exit_on_escape && wparam.0 == VK_ESCAPE.0 as usize {
                let _ = unsafe { DestroyWindow(hwnd) };
            } else {
                state.events.push_back(WindowEvent::KeyDown(key));
            }
            true
        }

        WM_KEYUP => {
            state.events.push_back(WindowEvent::KeyUp(wparam.0 as u8));
            true
        }

        WM_SIZE => {
            let (width, height) = split_lparam(lparam.0);
            state.events.push_back(WindowEvent::Resized(width, height));
            true
        }

        _ => false,
    }
}

extern "system" fn wndproc(hwnd: HWND, message: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match message {
        WM_CREATE => {
            let create_struct = unsafe { &*(lparam.0 as *const CREATESTRUCTA) };
            unsafe { SetWindowLongPtrA(hwnd, GWLP_USERDATA, create_struct.lpCreateParams as _) };
            LRESULT::default()
        }

        WM_DESTROY => {
            unsafe { PostQuitMessage(0) };
            LRESULT::default()
        }

        _ => {
            let user_data = unsafe { GetWindowLongPtrA(hwnd, GWLP_USERDATA) };
            let state = NonNull::<WindowState>::new(user_data as _);
            let handled = state.is_some_and(|mut s| {
                window_wndproc(hwnd, unsafe { s.as_mut() }, message, wparam, lparam)
            });

            if handled {
                LRESULT::default()
            } else {
                unsafe { DefWindowProcA(hwnd, message, wparam, lparam) }
            }
        }
    }
}
