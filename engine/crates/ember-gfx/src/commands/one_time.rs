use crate::{
    commands::{command_buffer::GfxCommandBuffer, label_color::LabelColor},
    device::GfxDevice,
    error::GfxResult,
};

/// Records `func` into a fresh command buffer, submits it and blocks until the queue is idle.
///
/// The command buffer is freed on every exit path, including a failed submit.
pub fn one_time_exec<R>(
    device: &dyn GfxDevice,
    name: &str,
    func: impl FnOnce(&GfxCommandBuffer) -> R,
) -> GfxResult<R> {
    crate::gfx_span!("one_time_exec");

    let vk_cmd = device.allocate_one_time_command_buffer(name)?;
    let guard = scopeguard::guard(vk_cmd, |vk_cmd| device.free_command_buffer(vk_cmd));

    let cmd = GfxCommandBuffer::new(device, *guard);
    cmd.begin_label(name, LabelColor::COLOR_CMD);
    let result = func(&cmd);
    cmd.end_label();

    device.submit_and_wait(*guard, name)?;
    log::trace!("one-time command buffer <{}> finished", name);

    Ok(result)
}
