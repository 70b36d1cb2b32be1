use water_gpu::{
    Capabilities, Capability, Command, Context, Filter, GpuError, PingPong, RecordingDevice, Texture,
    TextureOptions, TextureType, Viewport,
};

fn context_with(device: RecordingDevice) -> (Context, water_gpu::CommandLog) {
    let log = device.log();
    (Context::new(Box::new(device)), log)
}

fn float_options() -> TextureOptions {
    TextureOptions::default().with_type(TextureType::Float)
}

#[test]
fn draw_to_sets_and_restores_viewport_and_target() {
    let (mut context, log) = context_with(RecordingDevice::new());
    context.set_viewport(Viewport::new(10, 20, 640, 480));
    let texture = Texture::new(&mut context, 256, 128, float_options()).unwrap();

    let inside = texture
        .draw_to(&mut context, |context| Ok::<_, GpuError>(context.viewport()))
        .unwrap();

    assert_eq!(inside, Viewport::new(0, 0, 256, 128));
    assert_eq!(context.viewport(), Viewport::new(10, 20, 640, 480));
    assert!(!context.render_target_busy());
    let targets: Vec<_> = log
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            Command::SetRenderTarget(target) => Some(target.map(|t| t.color)),
            _ => None,
        })
        .collect();
    assert_eq!(targets, vec![Some(texture.handle()), None]);
}

#[test]
fn draw_to_restores_state_when_the_callback_fails() {
    let (mut context, _log) = context_with(RecordingDevice::new());
    let before = context.viewport();
    let texture = Texture::new(&mut context, 64, 64, TextureOptions::default()).unwrap();

    let result: Result<(), GpuError> = texture.draw_to(&mut context, |_| Err(GpuError::NoProgram));

    assert!(matches!(result, Err(GpuError::NoProgram)));
    assert_eq!(context.viewport(), before);
    assert!(!context.render_target_busy());
    // The slot is usable again.
    texture.draw_to(&mut context, |_| Ok::<_, GpuError>(())).unwrap();
}

#[test]
fn nested_draw_to_is_rejected() {
    let (mut context, _log) = context_with(RecordingDevice::new());
    let outer = Texture::new(&mut context, 32, 32, TextureOptions::default()).unwrap();
    let inner = Texture::new(&mut context, 32, 32, TextureOptions::default()).unwrap();

    let nested = outer
        .draw_to(&mut context, |context| {
            Ok::<_, GpuError>(inner.draw_to(context, |_| Ok::<_, GpuError>(())))
        })
        .unwrap();

    assert!(matches!(nested, Err(GpuError::RenderTargetBusy)));
    assert!(!context.render_target_busy());
}

#[test]
fn depth_buffer_follows_target_size() {
    let (mut context, log) = context_with(RecordingDevice::new());
    let a = Texture::new(&mut context, 64, 64, TextureOptions::default()).unwrap();
    let b = Texture::new(&mut context, 64, 64, TextureOptions::default()).unwrap();
    let c = Texture::new(&mut context, 128, 32, TextureOptions::default()).unwrap();

    for texture in [&a, &b, &a, &c] {
        texture.draw_to(&mut context, |_| Ok::<_, GpuError>(())).unwrap();
    }

    let created: Vec<_> = log
        .commands()
        .into_iter()
        .filter_map(|c| match c {
            Command::CreateDepthBuffer { width, height, .. } => Some((width, height)),
            _ => None,
        })
        .collect();
    assert_eq!(created, vec![(64, 64), (128, 32)]);
    assert_eq!(log.count(|c| matches!(c, Command::DestroyDepthBuffer(_))), 1);
}

#[test]
fn incomplete_target_is_reported_without_side_effects() {
    let device = RecordingDevice::new().without_render_target(TextureType::Float);
    let (mut context, _log) = context_with(device);
    let before = context.viewport();
    let texture = Texture::new(&mut context, 16, 16, float_options()).unwrap();

    assert!(!texture.can_draw_to(&context));
    let result = texture.draw_to(&mut context, |_| Ok::<_, GpuError>(()));

    assert!(matches!(result, Err(GpuError::IncompleteRenderTarget)));
    assert_eq!(context.viewport(), before);
    assert!(!context.render_target_busy());
    assert_eq!(
        GpuError::IncompleteRenderTarget.to_string(),
        "rendering to this texture is not supported (incomplete render target)"
    );
}

#[test]
fn missing_capabilities_fail_texture_creation() {
    let (mut context, _log) = context_with(RecordingDevice::with_capabilities(Capabilities::NONE));
    let err = Texture::new(&mut context, 8, 8, float_options()).unwrap_err();
    assert!(matches!(err, GpuError::MissingCapability(Capability::FloatTextures)));

    let caps = Capabilities {
        float_linear_filtering: false,
        ..Capabilities::ALL
    };
    let (mut context, _log) = context_with(RecordingDevice::with_capabilities(caps));
    let err = Texture::new(&mut context, 8, 8, float_options()).unwrap_err();
    assert!(matches!(err, GpuError::MissingCapability(Capability::FloatLinearFiltering)));
    assert!(Texture::new(&mut context, 8, 8, float_options().with_filter(Filter::Nearest)).is_ok());

    // Byte textures never need a capability.
    let (mut context, _log) = context_with(RecordingDevice::with_capabilities(Capabilities::NONE));
    assert!(Texture::new(&mut context, 8, 8, TextureOptions::default()).is_ok());
}

#[test]
fn swap_with_exchanges_identity() {
    let (mut context, _log) = context_with(RecordingDevice::new());
    let mut a = Texture::new(&mut context, 8, 8, TextureOptions::default()).unwrap();
    let mut b = Texture::new(&mut context, 16, 4, TextureOptions::default()).unwrap();
    let (ha, hb) = (a.handle(), b.handle());

    a.swap_with(&mut b);

    assert_eq!((a.handle(), a.width(), a.height()), (hb, 16, 4));
    assert_eq!((b.handle(), b.width(), b.height()), (ha, 8, 8));
}

#[test]
fn ping_pong_writes_scratch_and_swaps() {
    let (mut context, _log) = context_with(RecordingDevice::new());
    let mut state = PingPong::new(&mut context, 32, 32, float_options()).unwrap();
    let first = state.current().handle();
    let second = state.scratch().handle();
    assert_ne!(first, second);

    let read = state
        .render(&mut context, |_, current| Ok::<_, GpuError>(current.handle()))
        .unwrap();

    assert_eq!(read, first);
    assert_eq!(state.current().handle(), second);
    assert_eq!(state.current_index(), 1);
    assert_eq!(state.swap_count(), 1);
}

#[test]
fn failed_pass_does_not_swap() {
    let (mut context, _log) = context_with(RecordingDevice::new());
    let mut state = PingPong::new(&mut context, 32, 32, float_options()).unwrap();
    let before = state.current().handle();

    let result = state.render(&mut context, |_, _| Err::<(), _>(GpuError::NoProgram));

    assert!(result.is_err());
    assert_eq!(state.current().handle(), before);
    assert_eq!(state.swap_count(), 0);
}
