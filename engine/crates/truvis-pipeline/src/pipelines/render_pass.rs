use ash::vk;

/// pipeline 绑定 subpass 时需要的 render pass 信息
pub trait GfxRenderPassLayout {
    fn vk_render_pass(&self) -> vk::RenderPass;

    fn subpass_count(&self) -> u32;

    /// subpass 的 color attachments，顺序即 fragment shader 的输出顺序
    fn color_attachments(&self, subpass: u32) -> &[vk::AttachmentReference];

    fn depth_stencil_attachment(&self, subpass: u32) -> Option<vk::AttachmentReference>;

    fn attachment_samples(&self, attachment: u32) -> vk::SampleCountFlags;
}

/// 一个 subpass 用到的 attachments
#[derive(Clone, Debug, Default)]
pub struct GfxSubpassDesc {
    pub color_attachments: Vec<vk::AttachmentReference>,
    pub depth_stencil_attachment: Option<vk::AttachmentReference>,
}
impl GfxSubpassDesc {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// builder
    #[inline]
    pub fn color_attachment(mut self, attachment: u32, layout: vk::ImageLayout) -> Self {
        self.color_attachments.push(vk::AttachmentReference { attachment, layout });
        self
    }

    /// builder
    #[inline]
    pub fn depth_stencil_attachment(mut self, attachment: u32, layout: vk::ImageLayout) -> Self {
        self.depth_stencil_attachment = Some(vk::AttachmentReference { attachment, layout });
        self
    }
}

/// render pass 的一份描述，和创建 `vk::RenderPass` 时使用的信息一致
#[derive(Clone, Debug, Default)]
pub struct GfxRenderPassDesc {
    pub vk_handle: vk::RenderPass,
    pub attachments: Vec<vk::AttachmentDescription>,
    pub subpasses: Vec<GfxSubpassDesc>,
}
impl GfxRenderPassDesc {
    #[inline]
    pub fn new(vk_handle: vk::RenderPass) -> Self {
        Self {
            vk_handle,
            ..Default::default()
        }
    }

    /// builder
    #[inline]
    pub fn attachment(mut self, format: vk::Format, samples: vk::SampleCountFlags) -> Self {
        self.attachments.push(vk::AttachmentDescription::default().format(format).samples(samples));
        self
    }

    /// builder
    #[inline]
    pub fn subpass(mut self, subpass: GfxSubpassDesc) -> Self {
        self.subpasses.push(subpass);
        self
    }
}
impl GfxRenderPassLayout for GfxRenderPassDesc {
    #[inline]
    fn vk_render_pass(&self) -> vk::RenderPass {
        self.vk_handle
    }

    #[inline]
    fn subpass_count(&self) -> u32 {
        self.subpasses.len() as u32
    }

    fn color_attachments(&self, subpass: u32) -> &[vk::AttachmentReference] {
        self.subpasses.get(subpass as usize).map_or(&[], |subpass| subpass.color_attachments.as_slice())
    }

    fn depth_stencil_attachment(&self, subpass: u32) -> Option<vk::AttachmentReference> {
        self.subpasses.get(subpass as usize).and_then(|subpass| subpass.depth_stencil_attachment)
    }

    fn attachment_samples(&self, attachment: u32) -> vk::SampleCountFlags {
        self.attachments
            .get(attachment as usize)
            .map_or(vk::SampleCountFlags::TYPE_1, |attachment| attachment.samples)
    }
}
