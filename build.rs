use shadow_rs::ShadowBuilder;

fn main() {
    // Build metadata backing `conveyor --version`
    ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build metadata");
}
